use prompt2mesh::{pipeline, Config, Console};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from a .env file if it exists.
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,prompt2mesh=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;
    let mut console = Console::new();

    println!("--- prompt2mesh ---");
    let output = pipeline::run(&config, &mut console).await?;

    println!("\nAccepted prompt:\n{}", output.prompt);
    println!("Images:");
    for image in &output.images {
        println!("- {}: {}", image.viewpoint, image.path.display());
    }
    println!("Mesh (task {}): {}", output.mesh.task_id, output.mesh.path.display());

    Ok(())
}
