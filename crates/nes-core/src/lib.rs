pub mod backend;
pub mod bus;
pub mod cartridge;
pub mod console;
pub mod controller;
pub mod cpu;
mod error;
mod mem_block;
mod memory;
pub mod ppu;

pub use error::Error;

#[cfg(test)]
mod tests {
    use ctor::ctor;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    #[ctor]
    fn init_tracing() {
        let subscriber = FmtSubscriber::builder()
            .with_file(true)
            .with_line_number(true)
            .with_max_level(Level::TRACE)
            .pretty()
            .finish();
        tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
    }
}
