//! Description machine des points d’entrée exportés.
//!
//! Un générateur de code s’en sert pour émettre des déclarations qui
//! correspondent exactement aux symboles du runtime :
//! - `c_header()`          → texte de `aster_runtime.h` ;
//! - `llvm_declarations()` → lignes `declare …` pour l’IR LLVM ;
//! - `manifest_json()`     → (feature `serde`) manifest JSON.

use std::fmt::Write as _;

/// Types C qui traversent la frontière.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AbiType {
    Void,
    Int,
    LongLong,
    SizeT,
    VoidPtr,
    ConstCharPtr,
    CharPtr,
    ConstCharPtrArray,
    SizeTPtr,
}

impl AbiType {
    /// Orthographe C (sans nom de paramètre).
    pub const fn c_spelling(self) -> &'static str {
        match self {
            AbiType::Void => "void",
            AbiType::Int => "int",
            AbiType::LongLong => "long long",
            AbiType::SizeT => "size_t",
            AbiType::VoidPtr => "void*",
            AbiType::ConstCharPtr => "const char*",
            AbiType::CharPtr => "char*",
            AbiType::ConstCharPtrArray => "const char* const*",
            AbiType::SizeTPtr => "size_t*",
        }
    }

    /// Type LLVM (pointeurs opaques) ; `size_t` suit la largeur de pointeur.
    pub fn llvm_spelling(self, pointer_width: u8) -> String {
        match self {
            AbiType::Void => "void".into(),
            AbiType::Int => "i32".into(),
            AbiType::LongLong => "i64".into(),
            AbiType::SizeT => format!("i{pointer_width}"),
            AbiType::VoidPtr
            | AbiType::ConstCharPtr
            | AbiType::CharPtr
            | AbiType::ConstCharPtrArray
            | AbiType::SizeTPtr => "ptr".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AbiParam {
    pub name: &'static str,
    pub ty: AbiType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AbiSymbol {
    pub name: &'static str,
    pub ret: AbiType,
    pub params: &'static [AbiParam],
    pub noreturn: bool,
    pub doc: &'static str,
}

const fn p(name: &'static str, ty: AbiType) -> AbiParam {
    AbiParam { name, ty }
}

/// Table complète, dans l’ordre de l’en-tête.
pub static SYMBOLS: &[AbiSymbol] = &[
    AbiSymbol {
        name: "aster_panic",
        ret: AbiType::Void,
        params: &[p("msg", AbiType::ConstCharPtr), p("len", AbiType::SizeT)],
        noreturn: true,
        doc: "Prints `panic: <msg>` to stderr and aborts.",
    },
    AbiSymbol {
        name: "aster_malloc",
        ret: AbiType::VoidPtr,
        params: &[p("size", AbiType::SizeT)],
        noreturn: false,
        doc: "Allocates size bytes; aborts on exhaustion when size > 0, may return NULL when size == 0.",
    },
    AbiSymbol {
        name: "aster_free",
        ret: AbiType::Void,
        params: &[p("ptr", AbiType::VoidPtr)],
        noreturn: false,
        doc: "Releases a block from aster_malloc or aster_read_file; NULL is a no-op.",
    },
    AbiSymbol {
        name: "aster_write_stdout",
        ret: AbiType::Void,
        params: &[p("ptr", AbiType::ConstCharPtr), p("len", AbiType::SizeT)],
        noreturn: false,
        doc: "Writes len bytes to stdout and flushes.",
    },
    AbiSymbol {
        name: "aster_exit",
        ret: AbiType::Void,
        params: &[p("code", AbiType::Int)],
        noreturn: true,
        doc: "Orderly exit; atexit handlers run.",
    },
    AbiSymbol {
        name: "aster_puts",
        ret: AbiType::Int,
        params: &[p("str", AbiType::ConstCharPtr)],
        noreturn: false,
        doc: "Writes a NUL-terminated string and a newline; returns bytes written or -1.",
    },
    AbiSymbol {
        name: "aster_print_int",
        ret: AbiType::Void,
        params: &[p("value", AbiType::LongLong)],
        noreturn: false,
        doc: "Writes value in base 10 and flushes.",
    },
    AbiSymbol {
        name: "aster_println",
        ret: AbiType::Void,
        params: &[],
        noreturn: false,
        doc: "Writes a newline and flushes.",
    },
    AbiSymbol {
        name: "aster_init_args",
        ret: AbiType::Void,
        params: &[p("argc", AbiType::Int), p("argv", AbiType::ConstCharPtrArray)],
        noreturn: false,
        doc: "Stores the process arguments; call once, before any other argument access.",
    },
    AbiSymbol {
        name: "aster_argc",
        ret: AbiType::LongLong,
        params: &[],
        noreturn: false,
        doc: "Argument count, 0 before initialization.",
    },
    AbiSymbol {
        name: "aster_argv",
        ret: AbiType::ConstCharPtr,
        params: &[p("index", AbiType::LongLong)],
        noreturn: false,
        doc: "Argument at index, NULL when out of range or uninitialized.",
    },
    AbiSymbol {
        name: "aster_read_file",
        ret: AbiType::CharPtr,
        params: &[p("path", AbiType::ConstCharPtr), p("out_len", AbiType::SizeTPtr)],
        noreturn: false,
        doc: "Reads a whole file into a NUL-terminated buffer (free with aster_free); NULL on failure.",
    },
];

pub fn lookup(name: &str) -> Option<&'static AbiSymbol> {
    SYMBOLS.iter().find(|s| s.name == name)
}

impl AbiSymbol {
    /// Prototype C, sans `;` ni attribut.
    pub fn c_prototype(&self) -> String {
        let params = if self.params.is_empty() {
            "void".to_string()
        } else {
            self.params
                .iter()
                .map(|p| format!("{} {}", p.ty.c_spelling(), p.name))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("{} {}({})", self.ret.c_spelling(), self.name, params)
    }

    /// Ligne `declare` LLVM.
    pub fn llvm_declaration(&self, pointer_width: u8) -> String {
        let params = self
            .params
            .iter()
            .map(|p| p.ty.llvm_spelling(pointer_width))
            .collect::<Vec<_>>()
            .join(", ");
        let mut line = format!("declare {} @{}({})", self.ret.llvm_spelling(pointer_width), self.name, params);
        if self.noreturn {
            line.push_str(" noreturn");
        }
        line
    }
}

/// Texte complet de `aster_runtime.h`.
pub fn c_header() -> String {
    let mut out = String::with_capacity(2048);
    let _ = writeln!(out, "/* aster_runtime.h — generated by aster-runtime {}. Do not edit. */", crate::VERSION);
    out.push_str(concat!(
        "#ifndef ASTER_RUNTIME_H\n",
        "#define ASTER_RUNTIME_H\n",
        "\n",
        "#include <stddef.h>\n",
        "\n",
        "#if defined(__GNUC__) || defined(__clang__)\n",
        "#define ASTER_NORETURN __attribute__((noreturn))\n",
        "#else\n",
        "#define ASTER_NORETURN\n",
        "#endif\n",
        "\n",
        "#ifdef __cplusplus\n",
        "extern \"C\" {\n",
        "#endif\n",
    ));
    for sym in SYMBOLS {
        let _ = writeln!(out, "\n/* {} */", sym.doc);
        let attr = if sym.noreturn { "ASTER_NORETURN " } else { "" };
        let _ = writeln!(out, "{attr}{};", sym.c_prototype());
    }
    out.push_str(concat!(
        "\n",
        "#ifdef __cplusplus\n",
        "}\n",
        "#endif\n",
        "\n",
        "#endif /* ASTER_RUNTIME_H */\n",
    ));
    out
}

/// Bloc `declare` pour un module LLVM (cible de largeur `pointer_width`).
pub fn llvm_declarations(pointer_width: u8) -> String {
    let mut out = String::from("; Aster runtime declarations\n");
    for sym in SYMBOLS {
        out.push_str(&sym.llvm_declaration(pointer_width));
        out.push('\n');
    }
    out
}

/// Manifest JSON (tableau de symboles).
#[cfg(feature = "serde")]
pub fn manifest_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(SYMBOLS)
}
