use thiserror::Error;

use crate::ir::{LoopId, ValueId};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors are only produced while constructing IR through
/// [`FunctionBuilder`](crate::ir::FunctionBuilder). The analyses themselves never fail: an
/// unresolvable base, a partial decomposition, ambiguous aliasing or an inconsistent dimension
/// are recorded as data (validity flags, ambiguity markers, unknown nodes) on the results.
///
/// # Error Categories
///
/// ## IR Construction Errors
/// - [`Error::Malformed`] - Structurally invalid IR (unbalanced loops, misplaced inductions)
/// - [`Error::UnknownValue`] - An operand refers to a value that does not exist
/// - [`Error::UnknownLoop`] - A loop handle does not belong to the function
/// - [`Error::NotAPointer`] - A pointer operand has a non-pointer type
/// - [`Error::NotAFunction`] - A direct call names something other than a function
///
/// # Examples
///
/// ```rust
/// use memscope::{ir::{FunctionBuilder, Type}, Error};
///
/// let mut builder = FunctionBuilder::new("f");
/// let n = builder.argument("n", Type::Int(64));
/// match builder.load(n, 4) {
///     Err(Error::NotAPointer(value)) => println!("{value} is not a pointer"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The IR handed to the builder is structurally invalid.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An operand refers to a value that is not part of the function.
    #[error("Value {0} does not exist in this function")]
    UnknownValue(ValueId),

    /// A loop handle does not belong to the function.
    #[error("Loop {0} does not exist in this function")]
    UnknownLoop(LoopId),

    /// A value used as an address does not have pointer type.
    #[error("Value {0} is not a pointer")]
    NotAPointer(ValueId),

    /// A direct call target is not a function symbol.
    #[error("Value {0} is not a function")]
    NotAFunction(ValueId),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
