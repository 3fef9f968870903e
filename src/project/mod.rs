//! Files on disk: the source database, pack/unpack and batch checking.
//!
//! A unit may be written as one file or as a root file that `include`s
//! others. [`pack`] turns the second form into the first and [`unpack`]
//! goes the other way; [`batch::check`] resolves whole directory trees.

pub mod batch;
pub mod pack;
pub mod source;
pub mod unpack;

pub use batch::{BatchReport, check, discover, interface_of};
pub use pack::{FsLoader, MemoryLoader, Packer, SourceLoader, pack};
pub use source::SourceDb;
pub use unpack::{FlatLayout, LayoutPolicy, UnpackedTree, unpack, unpack_with};
