//! Architecture identifiers

use policy_core::{PolicyError, Result};
use seccompiler::TargetArch;
use std::fmt;
use std::str::FromStr;

/// Instruction-set ABI a filter can cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arch {
    X86,
    X86_64,
    X32,
    Arm,
    Aarch64,
    Mips,
    Mips64,
    Mips64N32,
    Mipsel,
    Mipsel64,
    Mipsel64N32,
    Ppc,
    Ppc64,
    Ppc64Le,
    S390,
    S390X,
    Riscv64,
}

impl Arch {
    pub const ALL: [Arch; 17] = [
        Arch::X86,
        Arch::X86_64,
        Arch::X32,
        Arch::Arm,
        Arch::Aarch64,
        Arch::Mips,
        Arch::Mips64,
        Arch::Mips64N32,
        Arch::Mipsel,
        Arch::Mipsel64,
        Arch::Mipsel64N32,
        Arch::Ppc,
        Arch::Ppc64,
        Arch::Ppc64Le,
        Arch::S390,
        Arch::S390X,
        Arch::Riscv64,
    ];

    /// Canonical `SCMP_ARCH_*` name
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86 => "SCMP_ARCH_X86",
            Arch::X86_64 => "SCMP_ARCH_X86_64",
            Arch::X32 => "SCMP_ARCH_X32",
            Arch::Arm => "SCMP_ARCH_ARM",
            Arch::Aarch64 => "SCMP_ARCH_AARCH64",
            Arch::Mips => "SCMP_ARCH_MIPS",
            Arch::Mips64 => "SCMP_ARCH_MIPS64",
            Arch::Mips64N32 => "SCMP_ARCH_MIPS64N32",
            Arch::Mipsel => "SCMP_ARCH_MIPSEL",
            Arch::Mipsel64 => "SCMP_ARCH_MIPSEL64",
            Arch::Mipsel64N32 => "SCMP_ARCH_MIPSEL64N32",
            Arch::Ppc => "SCMP_ARCH_PPC",
            Arch::Ppc64 => "SCMP_ARCH_PPC64",
            Arch::Ppc64Le => "SCMP_ARCH_PPC64LE",
            Arch::S390 => "SCMP_ARCH_S390",
            Arch::S390X => "SCMP_ARCH_S390X",
            Arch::Riscv64 => "SCMP_ARCH_RISCV64",
        }
    }

    /// Short libseccomp name (`amd64`, `arm64`, ...)
    pub fn short_name(&self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "amd64",
            Arch::X32 => "x32",
            Arch::Arm => "arm",
            Arch::Aarch64 => "arm64",
            Arch::Mips => "mips",
            Arch::Mips64 => "mips64",
            Arch::Mips64N32 => "mips64n32",
            Arch::Mipsel => "mipsel",
            Arch::Mipsel64 => "mipsel64",
            Arch::Mipsel64N32 => "mipsel64n32",
            Arch::Ppc => "ppc",
            Arch::Ppc64 => "ppc64",
            Arch::Ppc64Le => "ppc64le",
            Arch::S390 => "s390",
            Arch::S390X => "s390x",
            Arch::Riscv64 => "riscv64",
        }
    }

    /// Architecture of the running binary, if it is one seccomp knows
    pub fn native() -> Option<Arch> {
        #[cfg(target_arch = "x86_64")]
        {
            Some(Arch::X86_64)
        }
        #[cfg(target_arch = "aarch64")]
        {
            Some(Arch::Aarch64)
        }
        #[cfg(target_arch = "riscv64")]
        {
            Some(Arch::Riscv64)
        }
        #[cfg(target_arch = "x86")]
        {
            Some(Arch::X86)
        }
        #[cfg(target_arch = "arm")]
        {
            Some(Arch::Arm)
        }
        #[cfg(target_arch = "s390x")]
        {
            Some(Arch::S390X)
        }
        #[cfg(target_arch = "powerpc64")]
        {
            Some(Arch::Ppc64)
        }
        #[cfg(not(any(
            target_arch = "x86_64",
            target_arch = "aarch64",
            target_arch = "riscv64",
            target_arch = "x86",
            target_arch = "arm",
            target_arch = "s390x",
            target_arch = "powerpc64"
        )))]
        {
            None
        }
    }

    /// BPF code generation target, for the ABIs seccompiler can emit
    pub fn target_arch(&self) -> Option<TargetArch> {
        match self {
            Arch::X86_64 => Some(TargetArch::x86_64),
            Arch::Aarch64 => Some(TargetArch::aarch64),
            Arch::Riscv64 => Some(TargetArch::riscv64),
            _ => None,
        }
    }
}

impl FromStr for Arch {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        let alias = match s {
            "x86_64" => Some(Arch::X86_64),
            "aarch64" => Some(Arch::Aarch64),
            _ => None,
        };

        alias
            .or_else(|| {
                Arch::ALL
                    .into_iter()
                    .find(|arch| arch.as_str() == s || arch.short_name() == s)
            })
            .ok_or_else(|| PolicyError::InvalidArchitecture {
                arch: s.to_string(),
            })
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
