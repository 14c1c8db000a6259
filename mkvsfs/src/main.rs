//! `mkvsfs` creates a new filesystem image at a path, sized to hold a
//! requested number of bytes.

use std::env;
use std::path::PathBuf;
use std::process::exit;

use vsfs::Session;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
	/// The name of the current program used in command line.
	prog: String,
	/// If true, print command line help.
	help: bool,
	/// The path to the image file to create.
	image_path: Option<PathBuf>,
	/// The requested image size, in bytes.
	image_size: Option<i32>,
}

fn parse_args() -> Args {
	let mut args: Args = Default::default();
	let mut iter = env::args();

	args.prog = iter.next().unwrap_or("mkvsfs".to_owned());

	while let Some(arg) = iter.next() {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,

			_ if args.image_path.is_none() => {
				args.image_path = Some(PathBuf::from(arg));
			}

			_ if args.image_size.is_none() => {
				args.image_size = arg.parse().ok();
			}

			_ => {
				eprintln!("{}: too many arguments", args.prog);
				exit(1);
			}
		}
	}

	args
}

fn print_usage(prog: &str) {
	eprintln!("usage: {prog} <image-path> <image-size-bytes>");
}

fn main() {
	let args = parse_args();
	if args.help {
		print_usage(&args.prog);
		exit(0);
	}

	let image_path = args.image_path.unwrap_or_else(|| {
		print_usage(&args.prog);
		exit(1);
	});
	let image_size = args.image_size.unwrap_or_else(|| {
		print_usage(&args.prog);
		exit(1);
	});

	let session = Session::format(&image_path, image_size).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(1);
	});

	let sb = session.superblock();
	println!(
		"{}: {} blocks of {} bytes, {} files max",
		image_path.display(),
		sb.n_blocks,
		sb.block_size,
		sb.max_files
	);

	session.unmount().unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(1);
	});
}
