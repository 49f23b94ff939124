use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    catalog: Option<PathBuf>,
    config_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = parse_args(std::env::args().skip(1).collect())?;

    tones::app::run_with_startup(tones::app::AppStartupOptions {
        catalog: args.catalog,
        config_dir: args.config_dir,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            flag @ ("--catalog" | "--config-dir") => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("{flag} requires a path");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("{flag} cannot be empty");
                }
                let path = PathBuf::from(value.trim());
                if flag == "--catalog" {
                    out.catalog = Some(path);
                } else {
                    out.config_dir = Some(path);
                }
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("Tones");
    println!("  --catalog <path>      Track catalog JSON used for search and auto-play");
    println!("  --config-dir <path>   Directory holding storage.json and catalog.json");
    println!("  RUST_LOG=debug        Verbose logging");
}
