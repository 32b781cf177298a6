mod bitstream;
mod huffman;
mod lz77;
pub mod shrink;
pub use shrink::*;
pub mod implode;
pub use implode::*;
