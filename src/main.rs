#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = finance_dashboard::args::parse();
    finance_dashboard::cli::main(args).await
}
