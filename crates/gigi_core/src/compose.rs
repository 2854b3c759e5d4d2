use rand::Rng;

pub const REPLY_EMOJIS: [&str; 5] = ["🙂", "😉", "👍", "💬", "🌟"];

/// Used verbatim when nothing matched; each already carries its own emoji.
pub const FALLBACK_REPLIES: [&str; 3] = [
    "Hmm... não entendi muito bem 🤔. Pode tentar reformular?",
    "Desculpe, não consegui compreender 🧠. Pode dizer de outro jeito?",
    "Acho que não peguei isso direito 😅. Pode explicar novamente?",
];

pub const WELCOME_MESSAGE: &str = "Olá! Eu sou a GIGI. Como posso te ajudar hoje?";
pub const CLOSING_MESSAGE: &str = "Conversa encerrada. Sempre por aqui quando precisar! 💜";

/// Appends one emoji, separated by a space.
pub fn compose_reply<R: Rng + ?Sized>(base: &str, rng: &mut R) -> String {
    let emoji = REPLY_EMOJIS[rng.gen_range(0..REPLY_EMOJIS.len())];
    format!("{base} {emoji}")
}

pub fn fallback_reply<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    FALLBACK_REPLIES[rng.gen_range(0..FALLBACK_REPLIES.len())]
}
