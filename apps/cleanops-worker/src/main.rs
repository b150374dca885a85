use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = cleanops_worker::Args::parse();

	cleanops_worker::run(args).await
}
