use std::borrow::Cow;

/// Render a command line for prompts and error messages.
///
/// Arguments are shell-quoted only where needed so the common case reads
/// naturally (`git fetch origin`), while arguments with spaces stay
/// unambiguous (`/bin/bash -c 'my script.sh'`).
pub fn format_command<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(quote(program));
    parts.extend(args.iter().map(|arg| quote(arg.as_ref())));
    parts.join(" ")
}

fn quote(word: &str) -> Cow<'_, str> {
    shlex::try_quote(word).unwrap_or_else(|_| Cow::Owned(format!("{:?}", word)))
}
