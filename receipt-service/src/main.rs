use clap::Parser;
use receipt_service::cli::{self, Cli, Command};
use receipt_service::setup_environment;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 解析命令 (--help / 参数错误时直接退出)
    let cli = Cli::parse();

    // 2. 设置环境 (dotenv, 日志)
    let config = setup_environment()?;

    match cli.command {
        Command::Preview { kind, input } => {
            let job = cli::load_job(kind, &input)?;
            println!("{}", cli::preview(&config, &job)?);
        }
        Command::DryRun {
            kind,
            input,
            output,
        } => {
            let job = cli::load_job(kind, &input)?;
            let bytes = cli::dry_run(&config, &job).await?;
            tracing::info!(bytes = bytes.len(), "dry run complete");
            if let Some(path) = output {
                std::fs::write(&path, &bytes)?;
                tracing::info!(path = %path.display(), "frame written");
            }
        }
    }

    Ok(())
}
