//! `vsh` is a minimal interactive shell over a mounted image: enough to
//! exercise the core from a terminal, not a real command interpreter.
//! Scripting, globbing, and pipelines are out of scope; each line is one
//! command against the core, space-separated, no quoting.

mod prompt;

use std::env;
use std::process::exit;

use prompt::prompt;
use vsfs::{Session, END_ID};

fn usage(prog: &str) {
	eprintln!("usage: {prog} <image-path>");
}

fn main() {
	let mut args = env::args();
	let prog = args.next().unwrap_or_else(|| "vsh".to_owned());
	let image_path = args.next().unwrap_or_else(|| {
		usage(&prog);
		exit(1);
	});

	let mut session = Session::mount(&image_path).unwrap_or_else(|e| {
		eprintln!("{prog}: {image_path}: {e}");
		exit(1);
	});

	loop {
		let Some(line) = prompt("vsh> ") else {
			break;
		};
		let words: Vec<&str> = line.split_whitespace().collect();
		let Some(&cmd) = words.first() else {
			continue;
		};

		let result = run_command(&mut session, cmd, &words[1..]);
		if let Err(msg) = result {
			match msg {
				Command::Quit => break,
				Command::Error(msg) => eprintln!("vsh: {msg}"),
			}
		}
	}

	if let Err(e) = session.unmount() {
		eprintln!("{prog}: {e}");
		exit(1);
	}
}

enum Command {
	Quit,
	Error(String),
}

fn run_command(session: &mut Session, cmd: &str, rest: &[&str]) -> Result<(), Command> {
	match cmd {
		"quit" | "exit" => Err(Command::Quit),

		"ls" => {
			let mut advance = false;
			loop {
				let rec = session.readdir(advance).map_err(stringify)?;
				if rec.id == END_ID {
					break;
				}
				if rec.is_bound() {
					println!("{}\t{}", rec.id, String::from_utf8_lossy(rec.name_bytes()));
				}
				advance = true;
			}
			Ok(())
		}

		"stat" => {
			let id: i32 = arg(rest, 0)?.parse().map_err(|_| bad_arg("id"))?;
			let rec = session.stat(id).map_err(stringify)?;
			println!(
				"type={:?} nlinks={} size={} blocks={:?}",
				rec.ftype, rec.nlinks, rec.size, rec.blocks_map
			);
			Ok(())
		}

		"create" => {
			let name = arg(rest, 0)?;
			let id = session.create(name).map_err(stringify)?;
			println!("{id}");
			Ok(())
		}

		"cat" => {
			let name = arg(rest, 0)?;
			let fd = session.open(name).map_err(stringify)?;
			let mut offset = 0i32;
			let mut buf = [0u8; 256];
			loop {
				let n = session.read(fd, offset, &mut buf).map_err(stringify)?;
				if n == 0 {
					break;
				}
				print!("{}", String::from_utf8_lossy(&buf[..n]));
				offset += n as i32;
			}
			println!();
			session.close(fd).map_err(stringify)
		}

		"write" => {
			let name = arg(rest, 0)?;
			let offset: i32 = arg(rest, 1)?.parse().map_err(|_| bad_arg("offset"))?;
			let text = rest.get(2..).filter(|w| !w.is_empty()).ok_or_else(|| bad_arg("text"))?.join(" ");
			let fd = session.open(name).map_err(stringify)?;
			let n = session.write(fd, offset, text.as_bytes()).map_err(stringify)?;
			session.close(fd).map_err(stringify)?;
			println!("{n}");
			Ok(())
		}

		"link" => {
			let src = arg(rest, 0)?;
			let dest = arg(rest, 1)?;
			session.link(src, dest).map_err(stringify)
		}

		"unlink" => {
			let name = arg(rest, 0)?;
			session.unlink(name).map_err(stringify)
		}

		"truncate" => {
			let name = arg(rest, 0)?;
			let size: i32 = arg(rest, 1)?.parse().map_err(|_| bad_arg("size"))?;
			session.truncate(name, size).map_err(stringify)
		}

		"help" => {
			println!("ls | stat <id> | create <name> | cat <name> | write <name> <offset> <text...>");
			println!("link <src> <dest> | unlink <name> | truncate <name> <size> | quit");
			Ok(())
		}

		other => Err(Command::Error(format!("unknown command `{other}`, try `help`"))),
	}
}

fn arg<'a>(rest: &[&'a str], i: usize) -> Result<&'a str, Command> {
	rest.get(i).copied().ok_or_else(|| bad_arg("missing argument"))
}

fn bad_arg(what: &str) -> Command {
	Command::Error(format!("bad argument: {what}"))
}

fn stringify(e: vsfs::VsfsError) -> Command {
	Command::Error(e.to_string())
}
