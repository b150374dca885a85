use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = cleanops_api::Args::parse();

	cleanops_api::run(args).await
}
