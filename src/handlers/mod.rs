//! Command handler modules
//!
//! One module per subcommand. Handlers own every interactive prompt and
//! all terminal output; the library core below them only returns
//! structured decisions (staleness, context mismatch) for them to act on.

pub mod auth;
pub mod list;
pub mod platforms;
pub mod pull;
pub mod push;

use crate::session::Platform;

/// Are we attached to a real terminal on both ends?
///
/// The staleness and context-mismatch gates prompt only when this holds;
/// otherwise they fail loudly instead of guessing.
pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout)
}

/// Collect the boolean platform flags into the list the registry
/// validates. Keeping this a dumb collector means the "at most one flag"
/// rejection happens in one place, before any I/O.
pub fn platform_flags(claude: bool, gemini: bool, q: bool, codex: bool) -> Vec<Platform> {
    let mut flags = Vec::new();
    if claude {
        flags.push(Platform::Claude);
    }
    if gemini {
        flags.push(Platform::Gemini);
    }
    if q {
        flags.push(Platform::AmazonQ);
    }
    if codex {
        flags.push(Platform::Codex);
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_flags_collects_in_registration_order() {
        assert!(platform_flags(false, false, false, false).is_empty());
        assert_eq!(
            platform_flags(true, false, false, true),
            vec![Platform::Claude, Platform::Codex]
        );
        assert_eq!(
            platform_flags(true, true, true, true).len(),
            4
        );
    }
}
