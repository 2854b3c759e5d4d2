use unicode_normalization::UnicodeNormalization;

/// Canonical form used to compare questions: lower-case ASCII without
/// accents or punctuation, single-spaced and trimmed.
///
/// Characters are decomposed first so `"é"` becomes `"e"` plus a combining
/// mark; anything left outside ASCII afterwards is dropped.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace())
        .collect();

    folded.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_case_and_accents() {
        assert_eq!(normalize("Olá"), "ola");
        assert_eq!(normalize("OLÁ"), normalize("ola"));
        assert_eq!(normalize("Ação Rápida"), "acao rapida");
        assert_eq!(normalize("você"), "voce");
    }

    #[test]
    fn drops_punctuation_and_symbols() {
        assert_eq!(
            normalize("Qual é o e-mail do credenciamento?"),
            "qual e o email do credenciamento"
        );
        assert_eq!(normalize("link: https://portal!"), "link httpsportal");
        assert_eq!(normalize("oi 👋"), "oi");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  bom \t dia\n\n gigi  "), "bom dia gigi");
        assert_eq!(normalize("a\u{a0}b"), "a b");
    }

    #[test]
    fn empty_and_symbol_only_inputs() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("?!…"), "");
    }

    #[test]
    fn is_idempotent() {
        for input in [
            "Olá, tudo bem?",
            "ℌello Ⅻ ﬁm",
            "  ÇÃO\t\tção ",
            "e-mail / portal_frotista",
            "日本語 text",
            "",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
        }
    }
}
