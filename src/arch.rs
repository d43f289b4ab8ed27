//! Architecture-string classification shared by the object writers.
//!
//! Build systems hand us loose architecture names ("x86_64", "armeabi-v7a",
//! "loong64", ...); the writers need a word size and a per-format machine id
//! for each of them.

/// ELF e_machine values the writers can emit
pub mod elf_machine {
    pub const EM_SPARC: u16 = 0x02;
    pub const EM_386: u16 = 0x03;
    pub const EM_MIPS: u16 = 0x08;
    pub const EM_PPC: u16 = 0x14;
    pub const EM_PPC64: u16 = 0x15;
    pub const EM_S390: u16 = 0x16;
    pub const EM_ARM: u16 = 0x28;
    pub const EM_SH: u16 = 0x2a;
    pub const EM_SPARCV9: u16 = 0x2b;
    pub const EM_IA_64: u16 = 0x32;
    pub const EM_X86_64: u16 = 0x3e;
    pub const EM_AARCH64: u16 = 0xb7;
    pub const EM_WASM: u16 = 0xe7;
    pub const EM_RISCV: u16 = 0xf3;
    pub const EM_LOONGARCH: u16 = 0x102;
}

/// COFF machine types
pub mod coff_machine {
    pub const IMAGE_FILE_MACHINE_I386: u16 = 0x014c;
    pub const IMAGE_FILE_MACHINE_ARM: u16 = 0x01c0;
    pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
    pub const IMAGE_FILE_MACHINE_ARM64: u16 = 0xaa64;
}

/// Mach-O cpu types and subtypes
pub mod mach_cputype {
    pub const CPU_TYPE_X86: u32 = 7;
    pub const CPU_TYPE_X86_64: u32 = 0x0100_0007;
    pub const CPU_TYPE_ARM: u32 = 12;
    pub const CPU_TYPE_ARM64: u32 = 0x0100_000c;

    pub const CPU_SUBTYPE_X86: u32 = 3;
    pub const CPU_SUBTYPE_X86_64: u32 = 3;
    pub const CPU_SUBTYPE_ARM: u32 = 9;
    pub const CPU_SUBTYPE_ARM64: u32 = 0;
}

/// Mach-O build-version platforms
pub mod mach_platform {
    pub const PLATFORM_MACOS: u32 = 1;
    pub const PLATFORM_IOS: u32 = 2;
    pub const PLATFORM_TVOS: u32 = 3;
    pub const PLATFORM_WATCHOS: u32 = 4;
}

/// Whether `arch` names a 64-bit architecture. An absent arch defaults to
/// 64-bit, matching the writers' x86_64 default.
pub fn is_64bit(arch: Option<&str>) -> bool {
    let arch = match arch {
        Some(arch) => arch,
        None => return true,
    };
    match arch {
        "x86_64" | "x64" => true,
        "arm64" | "aarch64" | "arm64-v8a" => true,
        "s390x" => true,
        "wasm64" => true,
        "ia64" | "itanium" => true,
        _ => {
            arch.starts_with("mips64")
                || arch.starts_with("ppc64")
                || arch.starts_with("powerpc64")
                || arch.starts_with("riscv64")
                || (arch.starts_with("riscv") && arch.contains("64"))
                || arch.starts_with("sparc64")
                || arch.starts_with("loongarch64")
        }
    }
}

/// Map an architecture string to an ELF `e_machine`; unknown names fall back
/// to x86_64. Word size is carried separately by [`is_64bit`]; MIPS, RISC-V,
/// LoongArch and WASM reuse one machine id for both widths.
pub fn elf_machine(arch: Option<&str>) -> u16 {
    use self::elf_machine::*;
    let arch = match arch {
        Some(arch) => arch,
        None => return EM_X86_64,
    };
    match arch {
        "x86_64" | "x64" => EM_X86_64,
        "i386" | "x86" => EM_386,
        "arm64" | "aarch64" | "arm64-v8a" => EM_AARCH64,
        "arm" | "armv7" | "armeabi-v7a" | "armv6" | "armv5" => EM_ARM,
        "s390x" | "s390" => EM_S390,
        "ia64" | "itanium" => EM_IA_64,
        _ => {
            if arch.starts_with("mips") {
                EM_MIPS
            } else if arch.starts_with("ppc64") || arch.starts_with("powerpc64") {
                EM_PPC64
            } else if arch.starts_with("ppc") || arch.starts_with("powerpc") {
                EM_PPC
            } else if arch.starts_with("riscv") {
                EM_RISCV
            } else if arch.starts_with("sparc64") {
                EM_SPARCV9
            } else if arch.starts_with("sparc") {
                EM_SPARC
            } else if arch.starts_with("loongarch") || arch.starts_with("loong64") {
                EM_LOONGARCH
            } else if arch.starts_with("wasm") {
                EM_WASM
            } else if arch.starts_with("sh") || arch.starts_with("superh") {
                EM_SH
            } else {
                EM_X86_64
            }
        }
    }
}

/// Map an architecture string to a COFF machine type; unknown names fall back
/// to i386.
pub fn coff_machine(arch: Option<&str>) -> u16 {
    use self::coff_machine::*;
    match arch {
        Some("x86_64") | Some("x64") => IMAGE_FILE_MACHINE_AMD64,
        Some("arm64") | Some("aarch64") => IMAGE_FILE_MACHINE_ARM64,
        Some("arm") => IMAGE_FILE_MACHINE_ARM,
        _ => IMAGE_FILE_MACHINE_I386,
    }
}

/// Map an architecture string to a Mach-O `(cputype, cpusubtype)` pair;
/// unknown names fall back to x86_64.
pub fn mach_cputype(arch: Option<&str>) -> (u32, u32) {
    use self::mach_cputype::*;
    match arch {
        Some("arm64") | Some("aarch64") => (CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64),
        Some("arm") => (CPU_TYPE_ARM, CPU_SUBTYPE_ARM),
        Some("x86") | Some("i386") => (CPU_TYPE_X86, CPU_SUBTYPE_X86),
        _ => (CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64),
    }
}

/// Mach-O word size is narrower than the generic classification: only the
/// four cpu types the writer emits are meaningful here.
pub fn mach_is_64bit(arch: Option<&str>) -> bool {
    match arch {
        Some("arm") | Some("x86") | Some("i386") => false,
        _ => true,
    }
}

/// Map a platform string to a Mach-O build-version platform; unknown names
/// fall back to macOS.
pub fn mach_platform(platform: Option<&str>) -> u32 {
    use self::mach_platform::*;
    match platform {
        Some("iphoneos") | Some("ios") => PLATFORM_IOS,
        Some("appletvos") | Some("tvos") => PLATFORM_TVOS,
        Some("watchos") => PLATFORM_WATCHOS,
        _ => PLATFORM_MACOS,
    }
}

/// Pack a dotted version string into the Mach-O nibble encoding
/// `(major << 16) | (minor << 8) | patch`. Empty or absent versions encode
/// as 10.0.0.
pub fn mach_version(version: Option<&str>) -> u32 {
    let version = match version {
        Some(v) if !v.is_empty() => v,
        _ => return 0x000a_0000,
    };
    let mut parts = [0u32; 3];
    for (slot, component) in parts.iter_mut().zip(version.split('.')) {
        let digits: String = component.chars().take_while(|c| c.is_ascii_digit()).collect();
        *slot = digits.parse().unwrap_or(0);
    }
    (parts[0] << 16) | (parts[1] << 8) | parts[2]
}

/// Replace every byte that is not alphanumeric or `_` with `_`, yielding a
/// valid C identifier for the embedded-blob symbol names.
pub fn sanitize_symbol_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wordsize_classification() {
        for arch in [
            "x86_64", "x64", "arm64", "aarch64", "arm64-v8a", "mips64el", "ppc64le", "powerpc64",
            "riscv64", "sparc64", "s390x", "loongarch64", "wasm64", "ia64", "itanium",
        ] {
            assert!(is_64bit(Some(arch)), "{} should be 64-bit", arch);
        }
        for arch in ["x86", "i386", "arm", "armv7", "mips", "ppc", "riscv", "sparc", "s390", "wasm", "sh4"] {
            assert!(!is_64bit(Some(arch)), "{} should be 32-bit", arch);
        }
        assert!(is_64bit(None));
    }

    #[test]
    fn elf_machines() {
        assert_eq!(elf_machine(Some("x86_64")), elf_machine::EM_X86_64);
        assert_eq!(elf_machine(Some("armeabi-v7a")), elf_machine::EM_ARM);
        assert_eq!(elf_machine(Some("mips64")), elf_machine::EM_MIPS);
        assert_eq!(elf_machine(Some("riscv64")), elf_machine::EM_RISCV);
        assert_eq!(elf_machine(Some("loong64")), elf_machine::EM_LOONGARCH);
        assert_eq!(elf_machine(None), elf_machine::EM_X86_64);
    }

    #[test]
    fn sanitizes_to_identifier() {
        assert_eq!(sanitize_symbol_name("_binary_lib-1.2.so"), "_binary_lib_1_2_so");
    }

    #[test]
    fn packs_mach_versions() {
        assert_eq!(mach_version(Some("10.0")), 0x000a_0000);
        assert_eq!(mach_version(Some("18.2")), 0x0012_0200);
        assert_eq!(mach_version(Some("11.2.3")), 0x000b_0203);
        assert_eq!(mach_version(None), 0x000a_0000);
    }
}
