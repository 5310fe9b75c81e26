mod diagnostics;
mod process;
mod spawn;
