mod bullet_points;
mod prompt;

pub use bullet_points::{BulletPointPrinter, LineWriter, StdoutLineWriter};
pub use prompt::confirm;
