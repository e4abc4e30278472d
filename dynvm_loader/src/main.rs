//! Program loader.
//!
//! Runs a compiled program image. With no arguments the image is expected
//! to be appended to this executable (the last 8 bytes give the image
//! length); with a path argument the file may be either a standalone
//! image or another executable with an appended image.
//!
//! Usage:
//!   dynvm_loader [--disasm] [program.img]

mod host;

use std::env;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process;

use dynvm::{image, Engine};

/// Reserved exit code: no program image could be located or opened.
const EXIT_UNABLE_TO_LOAD: i32 = 32;

fn main() {
    let mut disasm = false;
    let mut path: Option<PathBuf> = None;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--disasm" => disasm = true,
            a if !a.starts_with('-') => path = Some(PathBuf::from(a)),
            _ => {
                eprintln!("Unknown argument: {}", arg);
                eprintln!("Usage: dynvm_loader [--disasm] [program.img]");
                process::exit(EXIT_UNABLE_TO_LOAD);
            }
        }
    }

    let path = match path {
        Some(p) => p,
        None => match env::current_exe() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("can not locate byte code data: {}", e);
                process::exit(EXIT_UNABLE_TO_LOAD);
            }
        },
    };

    let mut file = match File::open(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("can not open byte code data: {}", e);
            process::exit(EXIT_UNABLE_TO_LOAD);
        }
    };
    if let Err(e) = seek_to_image(&mut file) {
        eprintln!("can not locate byte code data: {}", e);
        process::exit(EXIT_UNABLE_TO_LOAD);
    }

    if disasm {
        process::exit(disassemble(&mut file, &path));
    }

    let mut engine = Engine::new();
    host::bind_host_calls(&mut engine);
    let outcome = engine
        .load_program(&mut file)
        .and_then(|()| engine.run());
    match outcome {
        Ok(code) => process::exit(code as i32),
        Err(error) => {
            let error = error.with_file(path.display().to_string());
            eprintln!("{}", error);
            process::exit(error.code());
        }
    }
}

fn disassemble(file: &mut File, path: &std::path::Path) -> i32 {
    match image::read_program(file) {
        Ok(program) => match serde_json::to_string_pretty(&program) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("can not serialize program: {}", e);
                1
            }
        },
        Err(error) => {
            let error = error.with_file(path.display().to_string());
            eprintln!("{}", error);
            error.code()
        }
    }
}

/// Position the stream at the image start.
///
/// A standalone image carries the magic at offset 0. Otherwise the file
/// is treated as an executable with an appended image: the trailing
/// little-endian u64 gives the image length, and the image starts that
/// many bytes (plus the trailer itself) before the end.
fn seek_to_image<S: Read + Seek>(stream: &mut S) -> io::Result<()> {
    stream.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; 16];
    if stream.read_exact(&mut magic).is_ok() && magic == image::MAGIC {
        stream.seek(SeekFrom::Start(0))?;
        return Ok(());
    }

    let total = stream.seek(SeekFrom::End(0))?;
    if total < 8 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "file too short for an appended image",
        ));
    }
    stream.seek(SeekFrom::End(-8))?;
    let mut trailer = [0u8; 8];
    stream.read_exact(&mut trailer)?;
    let image_len = u64::from_le_bytes(trailer);
    let offset = total
        .checked_sub(image_len.saturating_add(8))
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "appended image length invalid")
        })?;
    stream.seek(SeekFrom::Start(offset))?;
    Ok(())
}
