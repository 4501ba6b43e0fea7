//! aster-probe — se comporte comme un programme Aster compilé.
//!
//! Initialise `argv` via `aster_init_args` puis appelle les intrinsics C
//! demandés. Les tests d’intégration l’utilisent pour tout ce qui termine le
//! process (panic, exit, OOM) ou dont on doit observer la sortie réelle.
//!
//! Usage :
//!   aster-probe write "hi" [--abort]
//!   aster-probe int -42 [--newline] [--abort]
//!   aster-probe puts "hello"
//!   aster-probe args
//!   aster-probe cat path/to/file
//!   aster-probe exit 3
//!   aster-probe panic "boom" [--null]
//!   aster-probe oom --size 4096 [--cap 16]
//!   aster-probe abi --format c|llvm|json [--pointer-width 64]
//!
//! Les logs (`RUST_LOG`) vont sur stderr ; stdout ne contient que ce que le
//! runtime écrit.

#![allow(unsafe_code)]

use std::ffi::{c_char, c_int, CString};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use aster_runtime::args::{aster_argc, aster_argv, aster_init_args, ArgContext};
use aster_runtime::fs::aster_read_file;
use aster_runtime::heap::{self, aster_free, aster_malloc, CappedAllocator, LibcAllocator};
use aster_runtime::io::{aster_print_int, aster_println, aster_puts, aster_write_stdout};
use aster_runtime::panic::aster_panic;
use aster_runtime::process::aster_exit;
use aster_runtime::abi;

#[derive(Parser, Debug)]
#[command(name = "aster-probe", version, about = "Sonde du runtime Aster")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Écrit des octets bruts sur stdout (aster_write_stdout)
    Write {
        text: String,
        /// abort() juste après l’écriture (vérifie le flush)
        #[arg(long)]
        abort: bool,
    },
    /// Écrit un entier (aster_print_int)
    #[command(allow_negative_numbers = true)]
    Int {
        value: i64,
        #[arg(long)]
        newline: bool,
        #[arg(long)]
        abort: bool,
    },
    /// Écrit une ligne (aster_puts) et affiche le statut renvoyé
    Puts { text: String },
    /// Liste les arguments vus par le runtime
    Args,
    /// Copie un fichier sur stdout (aster_read_file) ; exit 1 si absent
    Cat { path: PathBuf },
    /// Sortie ordonnée (aster_exit)
    #[command(allow_negative_numbers = true)]
    Exit { code: i32 },
    /// Chemin fatal (aster_panic) ; `--null` passe un pointeur nul
    Panic {
        #[arg(default_value = "")]
        message: String,
        #[arg(long)]
        null: bool,
    },
    /// Allocation ; `--cap` borne les demandes acceptées par l’hôte
    Oom {
        #[arg(long)]
        size: usize,
        #[arg(long)]
        cap: Option<usize>,
    },
    /// Déclarations des symboles exportés
    Abi {
        #[arg(long, value_enum, default_value_t = AbiFormat::C)]
        format: AbiFormat,
        #[arg(long, default_value_t = 64)]
        pointer_width: u8,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum AbiFormat {
    C,
    Llvm,
    Json,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    // Comme le `main` généré : on confie argc/argv au runtime avant tout.
    let ctx = ArgContext::leak_from_os(std::env::args_os());
    let (argc, argv) = ctx.as_raw();
    let argc = c_int::try_from(argc).context("argc hors de portée de `int`")?;
    // SAFETY: vecteur fui, NUL-terminé, valide jusqu’à la fin du process.
    unsafe { aster_init_args(argc, argv) };

    let cli = Cli::parse();
    log::debug!("aster-probe {:?}", cli.cmd);
    match cli.cmd {
        Cmd::Write { text, abort } => {
            write_out(text.as_bytes());
            if abort {
                std::process::abort();
            }
        }
        Cmd::Int { value, newline, abort } => {
            aster_print_int(value);
            if newline {
                aster_println();
            }
            if abort {
                std::process::abort();
            }
        }
        Cmd::Puts { text } => {
            let c = CString::new(text).context("texte avec NUL interne")?;
            // SAFETY: chaîne NUL-terminée.
            let status = unsafe { aster_puts(c.as_ptr()) };
            eprintln!("status={status}");
        }
        Cmd::Args => cmd_args(),
        Cmd::Cat { path } => cmd_cat(&path)?,
        Cmd::Exit { code } => aster_exit(code),
        Cmd::Panic { message, null } => {
            let ptr = if null { std::ptr::null() } else { message.as_ptr().cast::<c_char>() };
            // SAFETY: (ptr, len) d’une String vivante, ou nul.
            unsafe { aster_panic(ptr, message.len()) }
        }
        Cmd::Oom { size, cap } => cmd_oom(size, cap),
        Cmd::Abi { format, pointer_width } => {
            let text = match format {
                AbiFormat::C => abi::c_header(),
                AbiFormat::Llvm => abi::llvm_declarations(pointer_width),
                AbiFormat::Json => abi_json()?,
            };
            write_out(text.as_bytes());
        }
    }
    aster_exit(0)
}

fn write_out(bytes: &[u8]) {
    // SAFETY: slice vivante.
    unsafe { aster_write_stdout(bytes.as_ptr().cast::<c_char>(), bytes.len()) }
}

fn cmd_args() {
    let n = aster_argc();
    write_out(b"argc=");
    aster_print_int(n);
    aster_println();
    for i in 0..n {
        aster_print_int(i);
        write_out(b": ");
        let p = aster_argv(i);
        if p.is_null() {
            write_out(b"<absent>");
        } else {
            // SAFETY: pointeur issu du vecteur initialisé, NUL-terminé.
            let s = unsafe { std::ffi::CStr::from_ptr(p) };
            write_out(s.to_bytes());
        }
        aster_println();
    }
    for probe in [-1, n, n + 100] {
        if !aster_argv(probe).is_null() {
            write_out(b"out-of-range index returned a value\n");
            aster_exit(2);
        }
    }
}

fn cmd_cat(path: &std::path::Path) -> Result<()> {
    let c = CString::new(path.as_os_str().as_encoded_bytes()).context("chemin avec NUL interne")?;
    let mut len = 0usize;
    // SAFETY: chemin NUL-terminé, `len` inscriptible.
    let buf = unsafe { aster_read_file(c.as_ptr(), &mut len) };
    if buf.is_null() {
        log::info!("lecture impossible: {}", path.display());
        aster_exit(1);
    }
    // SAFETY: buf pointe sur len + 1 octets (terminateur inclus).
    unsafe {
        if *buf.add(len) != 0 {
            bail!("terminateur NUL manquant");
        }
        aster_write_stdout(buf, len);
        aster_free(buf.cast());
    }
    Ok(())
}

fn cmd_oom(size: usize, cap: Option<usize>) {
    let ptr = match cap {
        Some(max) => heap::allocate_with(&CappedAllocator::new(LibcAllocator, max), size),
        None => std::ptr::NonNull::new(aster_malloc(size).cast::<u8>()),
    };
    match ptr {
        Some(p) => {
            write_out(b"allocated\n");
            // SAFETY: bloc issu de malloc (directement ou via le plafond).
            unsafe { aster_free(p.as_ptr().cast()) };
        }
        None => write_out(b"absent\n"),
    }
}

#[cfg(feature = "serde")]
fn abi_json() -> Result<String> {
    let mut s = abi::manifest_json()?;
    s.push('\n');
    Ok(s)
}

#[cfg(not(feature = "serde"))]
fn abi_json() -> Result<String> {
    bail!("manifest JSON indisponible : recompiler avec la feature `serde`")
}
