use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Clone, Debug, Parser)]
#[command(name = "ferry", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Configuration file. Default: ./ferry.toml when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "g", name = "get", about = "Download one or more URLs")]
    Get(GetArg),
    #[command(alias = "p", name = "put", about = "Upload a file as multipart/form-data")]
    Put(PutArg),
}

#[derive(Clone, Debug, Args)]
pub struct GetArg {
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Directory to place downloads in
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Extra request header, `Name: value`
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Start every download at once instead of waiting for admission
    #[arg(long)]
    pub immediate: bool,
}

#[derive(Clone, Debug, Args)]
pub struct PutArg {
    pub file: PathBuf,

    pub url: String,

    /// Form field carrying the file
    #[arg(long, default_value = "file")]
    pub field: String,

    /// File name sent in the form. Default: the local file name
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, default_value = "application/octet-stream")]
    pub mime: String,

    /// Extra request header, `Name: value`
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in `{raw}`"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Authorization: Bearer x:y").unwrap(),
            ("Authorization".to_string(), "Bearer x:y".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn test_get_args() {
        let app = App::parse_from([
            "ferry",
            "get",
            "http://h/a",
            "http://h/b",
            "-d",
            "/tmp/out",
            "-H",
            "X-A: 1",
            "--immediate",
        ]);
        let Commands::Get(arg) = app.cmd else {
            panic!("expected get");
        };
        assert_eq!(arg.urls, vec!["http://h/a", "http://h/b"]);
        assert_eq!(arg.dir, PathBuf::from("/tmp/out"));
        assert_eq!(arg.headers, vec![("X-A".to_string(), "1".to_string())]);
        assert!(arg.immediate);
    }

    #[test]
    fn test_put_args() {
        let app = App::parse_from(["ferry", "--json", "put", "a.txt", "http://h/u", "--field", "doc"]);
        assert!(app.json);
        let Commands::Put(arg) = app.cmd else {
            panic!("expected put");
        };
        assert_eq!(arg.file, PathBuf::from("a.txt"));
        assert_eq!(arg.field, "doc");
        assert_eq!(arg.mime, "application/octet-stream");
        assert_eq!(arg.name, None);
    }

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        App::command().debug_assert();
    }
}
