mod error_chain_ext;

pub use error_chain_ext::ErrorChainExt;
