//! Example program seeded into the editor when a tour reaches its checkpoint

use crate::tour::builtin::regions;
use crate::tour::InMemorySurface;

/// Generated PIK code for the example
pub const EXAMPLE_PROGRAM: &str = "repetir 5 veces:\n  mostrar \"¡Hola Mundo!\"\n";

/// Block labels as they render on the canvas, outermost first
pub const EXAMPLE_BLOCKS: &[&str] = &["repetir", "5", "veces", "mostrar", "¡Hola Mundo!"];

/// Replace the canvas and code view with the example program
pub fn seed(surface: &InMemorySurface) {
    surface.set_region_text(regions::CANVAS, &EXAMPLE_BLOCKS.join(" "));
    surface.set_region_text(regions::CODE_VIEW, EXAMPLE_PROGRAM);
    surface.set_generated_code(EXAMPLE_PROGRAM);
    tracing::info!("Seeded example program");
}
