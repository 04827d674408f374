//! Instruction-set ABIs an APK can ship native code for.

vocabulary! {
    /// Android ABI as reported by `native-code:` lines and `ro.product.cpu.abilist`.
    ///
    /// # Example
    ///
    /// ```
    /// use apkit_schema::Abi;
    ///
    /// assert_eq!(Abi::from("arm64-v8a"), Abi::Arm64V8a);
    /// assert!(Abi::from("loongarch64").is_unknown());
    /// ```
    pub enum Abi {
        /// 32-bit `ARMv5` (`armeabi`).
        Armeabi => "armeabi",
        /// 32-bit `ARMv7` (`armeabi-v7a`).
        ArmeabiV7a => "armeabi-v7a",
        /// 64-bit `ARMv8` (`arm64-v8a`).
        Arm64V8a => "arm64-v8a",
        /// 32-bit Intel (`x86`).
        X86 => "x86",
        /// 64-bit Intel (`x86_64`).
        X86_64 => "x86_64",
        /// 32-bit MIPS, deprecated since NDK r17.
        Mips => "mips",
        /// 64-bit MIPS, deprecated since NDK r17.
        Mips64 => "mips64",
        /// 64-bit RISC-V.
        Riscv64 => "riscv64",
    }
}

impl Abi {
    /// Every known ABI, in the order devices usually prefer them.
    pub const KNOWN: [Abi; 8] = [
        Abi::Arm64V8a,
        Abi::ArmeabiV7a,
        Abi::Armeabi,
        Abi::X86_64,
        Abi::X86,
        Abi::Riscv64,
        Abi::Mips64,
        Abi::Mips,
    ];

    /// Parse the token used in split names (`config.arm64_v8a`).
    ///
    /// Returns `None` for anything that is not an ABI, so callers can fall
    /// through to density and locale classification.
    pub fn from_split_token(token: &str) -> Option<Self> {
        match token {
            "armeabi" => Some(Self::Armeabi),
            "armeabi_v7a" => Some(Self::ArmeabiV7a),
            "arm64_v8a" => Some(Self::Arm64V8a),
            "x86" => Some(Self::X86),
            "x86_64" => Some(Self::X86_64),
            "mips" => Some(Self::Mips),
            "mips64" => Some(Self::Mips64),
            "riscv64" => Some(Self::Riscv64),
            _ => None,
        }
    }

    /// Whether a device running `self` can execute native code built for `other`.
    ///
    /// Intel devices run ARM code through binary translation, and 64-bit ARM
    /// keeps 32-bit ARM compatibility.
    pub fn is_compatible_with(&self, other: &Abi) -> bool {
        if self == other {
            return true;
        }
        match self {
            Self::X86_64 => matches!(
                other,
                Self::X86 | Self::Arm64V8a | Self::ArmeabiV7a | Self::Armeabi
            ),
            Self::X86 => matches!(other, Self::Arm64V8a | Self::ArmeabiV7a | Self::Armeabi),
            Self::Arm64V8a => matches!(other, Self::ArmeabiV7a | Self::Armeabi),
            Self::ArmeabiV7a => matches!(other, Self::Armeabi),
            Self::Mips64 => matches!(other, Self::Mips),
            _ => false,
        }
    }
}
