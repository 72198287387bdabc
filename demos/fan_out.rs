use keywheel::{KeyBroker, LlmRouter, Message, ProviderType, use_logging};
use std::sync::Arc;

use log::info;

#[tokio::main]
async fn main() {
    use_logging();

    info!("Starting fan-out demo");

    // Picks up OPENAI_API_KEY_1.., GOOGLE_API_KEY_1.., GROQ_API_KEY_1..
    // and friends; providers without keys are skipped at selection time.
    let broker = Arc::new(KeyBroker::from_env());

    if broker.providers().is_empty() {
        eprintln!("No API keys found in the environment.");
        eprintln!("Set e.g. GROQ_API_KEY_1 (or GROQ_API_KEY) and run again.");
        return;
    }

    let router = LlmRouter::new(broker.clone());

    let messages = vec![
        Message::system("You are a terse assistant."),
        Message::user("What's your name?"),
    ];

    let models = ["gpt-4o", "gemini-2.5-flash", "groq/llama-3.3-70b-versatile"];
    let replies = router.invoke_many(&models, &messages).await;

    for reply in replies {
        match reply.result {
            Ok(chat) => println!("[{}] {}", reply.model, chat.content),
            Err(err) => println!("[{}] failed: {}", reply.model, err),
        }
    }

    for provider in [ProviderType::OpenAI, ProviderType::Google, ProviderType::Groq] {
        if let Ok(status) = broker.provider_status(provider) {
            println!(
                "{}: {}/{} keys available",
                provider, status.available_keys, status.total_keys
            );
        }
    }
}
