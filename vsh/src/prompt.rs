//! Minimal line prompting for the interactive shell. Unlike a login
//! prompt, no input here is ever a secret, so there is no termios
//! fiddling to hide keystrokes.

use std::io::{self, BufRead, Write};

/// Shows `prompt`, then returns the next line of input, or `None` at
/// end of input (Ctrl-D).
pub fn prompt(prompt: &str) -> Option<String> {
	print!("{prompt}");
	let _ = io::stdout().flush();

	let input = io::stdin().lock().lines().next()?.unwrap_or_default();
	Some(input)
}
