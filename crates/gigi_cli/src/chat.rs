use anyhow::Result;
use gigi_core::Transcript;
use rand::Rng;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::Engine;

const END_COMMAND: &str = "/sair";

fn print_history(transcript: &Transcript, limit: usize) {
    for (speaker, message) in transcript.recent(limit) {
        println!("{}: {}", speaker.label(), message);
    }
    println!();
}

pub fn run<R: Rng + ?Sized>(engine: &Engine, rng: &mut R) -> Result<()> {
    let limit = engine.config().history_limit;
    let mut transcript = Transcript::new();
    let mut rl = DefaultEditor::new()?;

    println!("Digite sua pergunta ({END_COMMAND} encerra a conversa, exit sai).");
    print_history(&transcript, limit);

    loop {
        let line = match rl.readline("Você: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if matches!(trimmed.to_ascii_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        rl.add_history_entry(trimmed).ok();

        if trimmed == END_COMMAND {
            transcript.reset();
        } else {
            let reply = engine.answer_with(trimmed, rng);
            transcript.push_user(trimmed);
            transcript.push_assistant(reply.text);
        }

        print_history(&transcript, limit);
    }

    Ok(())
}
