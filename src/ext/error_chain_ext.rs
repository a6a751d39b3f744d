use std::error::Error;

/// Renders an error and its full source chain on one line, for aggregate
/// reports and evaluator messages.
pub trait ErrorChainExt {
    fn error_chain(&self) -> String;
}

impl<E: Error> ErrorChainExt for E {
    fn error_chain(&self) -> String {
        let mut message = self.to_string();
        let mut current = self.source();
        while let Some(source) = current {
            message.push_str(": ");
            message.push_str(&source.to_string());
            current = source.source();
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snafu::{ResultExt, Snafu};

    #[derive(Debug, Snafu)]
    #[snafu(display("outer failure"))]
    struct Outer {
        source: std::io::Error,
    }

    #[test]
    fn chains_source_messages() {
        let io_err = std::io::Error::other("inner failure");
        let err: Outer = Err::<(), _>(io_err).context(OuterSnafu).unwrap_err();
        assert_eq!(err.error_chain(), "outer failure: inner failure");
    }
}
