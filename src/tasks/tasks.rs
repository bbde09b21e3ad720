use std::fmt;

use serde::{Deserialize, Serialize};

pub fn fun_sin(arg: f64) -> f64 {
    arg.sin()
}

pub fn fun_sqrt(arg: f64) -> f64 {
    arg.sqrt()
}

pub fn fun_pow(base: f64, exp: f64) -> f64 {
    base.powf(exp)
}

/// The numeric function a client schedules on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    Sin,
    Sqrt,
    /// `2^x`
    Pow,
}

impl Kernel {
    pub const ALL: [Kernel; 3] = [Kernel::Sin, Kernel::Sqrt, Kernel::Pow];

    pub fn apply(self, arg: f64) -> f64 {
        match self {
            Kernel::Sin => fun_sin(arg),
            Kernel::Sqrt => fun_sqrt(arg),
            Kernel::Pow => fun_pow(2.0, arg),
        }
    }

    /// Arguments are drawn uniformly from `[0, arg_range)`.
    pub fn arg_range(self) -> f64 {
        match self {
            Kernel::Sin => 7.0,
            Kernel::Sqrt => 100.0,
            Kernel::Pow => 10.0,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Kernel::Sin => "sin.txt",
            Kernel::Sqrt => "sqrt.txt",
            Kernel::Pow => "pow.txt",
        }
    }

    /// Binds `arg` into a callable ready for `Server::submit`.
    pub fn bind(self, arg: f64) -> impl FnOnce() -> f64 + Send + 'static {
        move || self.apply(arg)
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kernel::Sin => "Sin",
            Kernel::Sqrt => "Sqrt",
            Kernel::Pow => "Pow",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernels_match_std() {
        assert_eq!(Kernel::Sin.apply(0.0), 0.0);
        assert_eq!(Kernel::Sqrt.apply(4.0), 2.0);
        assert_eq!(Kernel::Pow.apply(3.0), 8.0);
        assert_eq!(fun_pow(3.0, 2.0), 9.0);
    }

    #[test]
    fn bind_captures_argument() {
        let call = Kernel::Sqrt.bind(81.0);
        assert_eq!(call(), 9.0);
    }

    #[test]
    fn serde_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&Kernel::Sqrt).unwrap(), "\"sqrt\"");
        let k: Kernel = serde_json::from_str("\"pow\"").unwrap();
        assert_eq!(k, Kernel::Pow);
    }
}
