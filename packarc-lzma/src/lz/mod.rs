//! LZ dictionary management: the encoder's sliding input window, the
//! decoder's circular output window and the hashed binary-tree match finder.

mod input_window;
mod match_finder;
mod output_window;

pub use input_window::InputWindow;
pub use match_finder::{MatchFinder, MatchFinderKind};
pub use output_window::OutputWindow;
