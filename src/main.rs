use env_logger::Env;
use permit_crawl::{
    configuration::get_configuration,
    startup::{run, Job},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");
    let job: Job = std::env::args()
        .nth(1)
        .unwrap_or_default()
        .parse()?;

    let summary = run(job, configuration).await?;
    log::info!("Run summary: {}", serde_json::to_string(&summary)?);

    Ok(())
}
