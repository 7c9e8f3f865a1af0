use agent_stream::init_observability;
use agent_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    init_observability();

    let mut args = std::env::args().skip(1);
    let agent = args.next().unwrap_or_else(|| "assistant".to_string());
    let message = args.collect::<Vec<_>>().join(" ");
    let message = if message.is_empty() {
        "Say hello.".to_string()
    } else {
        message
    };

    let client = AgentClient::from_env()?;
    let mut stream = client
        .run(RunTarget::agent(agent))
        .message(message)
        .start_stream()
        .await?;

    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::Message(message) => print!("{}", message.content),
            StreamEvent::Completed { .. } => println!(),
            StreamEvent::Failed { error } => eprintln!("run error: {error}"),
        }
    }

    let stats = stream.finish().await?;
    println!(
        "{}ms, {} tool calls, {} memory updates",
        stats.total_duration_ms.unwrap_or_default(),
        stats.tool_calls,
        stats.memory_updates
    );
    Ok(())
}
