// src/args.rs

use crate::invocation::Invocation;
use std::fmt;
use std::path::{Path, PathBuf};

/// Conversion of a heterogeneous value into a single command-line token.
///
/// This is the accumulation seam of the argument builder: one generic
/// [`Invocation::arg`] method replaces a family of per-type insertion
/// overloads. Numeric values render through `Display`, which is canonical
/// and locale-independent; paths render lossily as UTF-8.
pub trait ToArg {
    /// Renders the value as one argument token.
    fn to_arg(&self) -> String;
}

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> String {
        (**self).to_arg()
    }
}

impl ToArg for str {
    fn to_arg(&self) -> String {
        self.to_owned()
    }
}

impl ToArg for String {
    fn to_arg(&self) -> String {
        self.clone()
    }
}

impl ToArg for Path {
    fn to_arg(&self) -> String {
        self.to_string_lossy().into_owned()
    }
}

impl ToArg for PathBuf {
    fn to_arg(&self) -> String {
        self.to_string_lossy().into_owned()
    }
}

macro_rules! impl_to_arg_for_numbers {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToArg for $ty {
                fn to_arg(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_to_arg_for_numbers!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl Invocation {
    /// Appends one token to the argument vector. The first token appended
    /// is the executable path or name.
    pub fn arg(&mut self, value: impl ToArg) -> &mut Self {
        self.push_token(value.to_arg());
        self
    }

    /// Appends every value of an iterable as its own token, in order.
    pub fn args<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        for value in values {
            self.push_token(value.to_arg());
        }
        self
    }
}

/// Renders the full invocation as a space-joined command line, for display
/// and logging purposes only (no shell quoting is applied).
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.get_args().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(token)?;
        }
        Ok(())
    }
}
