//! Tours shipped with the PIK Visual editor

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::catalog::{CatalogError, Step, StepCatalog, StepContent};
use super::rule::DetectionRule;
use super::types::{Placement, TargetRef};

/// Editor regions addressed by the built-in tours
pub mod regions {
    pub const TITLE: &str = "h1";
    pub const BLOCKS_BUTTON: &str = "[data-tour=\"blocks-button\"]";
    pub const BLOCKS_PANEL: &str = "[data-tour=\"blocks-panel\"]";
    pub const BLOCKS_EDITOR: &str = "[data-tour=\"blocks-editor\"]";
    pub const CODE_VIEW: &str = "[data-tour=\"code-view\"]";
    pub const CONTROLS: &str = "[data-tour=\"controls\"]";
    pub const RUN_BUTTON: &str = "[data-tour=\"run-button\"]";
    pub const CONSOLE: &str = "[data-tour=\"console\"]";
    /// Rendered blocks on the workspace canvas
    pub const CANVAS: &str = ".blocklyBlockCanvas .blocklyBlock";
}

/// Which built-in tour to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    /// Hands-on "Hola Mundo" tutorial with gated steps
    #[default]
    Interactive,
    /// Feature walkthrough that ends by seeding an example program
    Overview,
}

impl CatalogKind {
    pub fn catalog(self) -> Result<StepCatalog, CatalogError> {
        match self {
            CatalogKind::Interactive => interactive(),
            CatalogKind::Overview => overview(),
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogKind::Interactive => write!(f, "interactive"),
            CatalogKind::Overview => write!(f, "overview"),
        }
    }
}

/// A block placed on the canvas, also accepted once it shows up in the
/// generated program
fn block_added(concept: &str) -> DetectionRule {
    DetectionRule::in_region(regions::CANVAS)
        .concept(concept)
        .code_token(concept)
}

/// Step-by-step tutorial building `repetir 5 veces: mostrar "¡Hola Mundo!"`
pub fn interactive() -> Result<StepCatalog, CatalogError> {
    use regions::*;

    StepCatalog::new(vec![
        Step::new(
            TargetRef::Body,
            Placement::Center,
            StepContent::new(
                "¡Bienvenido a PIK Visual! 🎉",
                "Te voy a enseñar paso a paso cómo crear tu primer programa. \
                 Haremos un \"¡Hola Mundo!\" que se repita 5 veces.",
            ),
        ),
        Step::new(
            TargetRef::region(TITLE),
            Placement::Bottom,
            StepContent::new(
                "PIK Visual",
                "Esta herramienta te permite programar usando bloques visuales, similar a Scratch.",
            ),
        ),
        Step::new(
            TargetRef::region(BLOCKS_BUTTON),
            Placement::Bottom,
            StepContent::new(
                "Paso 1: Abrir la Paleta de Bloques 🎨",
                "👆 HAZ CLIC en el botón \"☰ Bloques\"",
            )
            .with_waiting_hint("Esperando que hagas clic en \"☰ Bloques\"..."),
        )
        .gated(DetectionRule::region_rendered(BLOCKS_PANEL)),
        Step::new(
            TargetRef::region(BLOCKS_PANEL),
            Placement::Right,
            StepContent::new(
                "Paso 2: Buscar el bloque \"repetir\" 🔄",
                "Busca la categoría \"🧠 Control de flujo\" y haz clic en el bloque \"🧱 repetir\"",
            )
            .with_waiting_hint("Esperando que agregues el bloque \"repetir\"..."),
        )
        .gated(block_added("repetir")),
        Step::new(
            TargetRef::region(BLOCKS_EDITOR),
            Placement::Left,
            StepContent::new(
                "Paso 3: Agregar el número 5 🔢",
                "Busca \"🔢 Valores\", agrega un \"🧱 numero\", conéctalo donde dice \"veces\" y cámbialo a 5",
            )
            .with_waiting_hint("Esperando que agregues el número 5..."),
        )
        .gated(
            DetectionRule::in_region(CANVAS)
                .concept("numero")
                .concept("5")
                .code_token("repetir 5"),
        ),
        Step::new(
            TargetRef::region(BLOCKS_EDITOR),
            Placement::Left,
            StepContent::new(
                "Paso 4: Agregar \"mostrar\" 🗣️",
                "Ve a \"⚙️ Acciones\", haz clic en \"🧱 mostrar\" y conéctalo DENTRO del bloque repetir",
            )
            .with_waiting_hint("Esperando que agregues el bloque \"mostrar\"..."),
        )
        .gated(block_added("mostrar")),
        Step::new(
            TargetRef::region(BLOCKS_EDITOR),
            Placement::Left,
            StepContent::new(
                "Paso 5: Agregar el texto 📝",
                "Ve a \"🔢 Valores\", agrega un \"🧱 texto\", conéctalo a mostrar y escribe \"¡Hola Mundo!\"",
            )
            .with_waiting_hint("Esperando que agregues el texto \"¡Hola Mundo!\"..."),
        )
        .gated(
            DetectionRule::in_region(CANVAS)
                .concept("texto")
                .keyword("Hola Mundo")
                .code_token("Hola Mundo"),
        ),
        Step::new(
            TargetRef::region(CODE_VIEW),
            Placement::Left,
            StepContent::new(
                "Tu código PIK 📝",
                "Los bloques que conectaste generan este programa en el lenguaje PIK.",
            ),
        ),
        Step::new(
            TargetRef::region(RUN_BUTTON),
            Placement::Left,
            StepContent::new(
                "Paso 6: ¡Ejecutar! ▶️",
                "👆 HAZ CLIC en \"Ejecutar\" para ver tu programa funcionar",
            )
            .with_waiting_hint("Esperando que ejecutes el programa..."),
        )
        .gated(
            DetectionRule::in_region(CONSOLE)
                .keyword("Hola Mundo")
                .synonym("hola mundo"),
        ),
        Step::new(
            TargetRef::region(CONSOLE),
            Placement::Left,
            StepContent::new(
                "¡Felicidades! 🎉",
                "¡Has creado tu primer programa! Deberías ver \"¡Hola Mundo!\" 5 veces en la consola.",
            ),
        )
        .checkpoint(),
    ])
}

/// Eight-step feature walkthrough; the console step seeds the example
pub fn overview() -> Result<StepCatalog, CatalogError> {
    use regions::*;

    StepCatalog::new(vec![
        Step::new(
            TargetRef::Body,
            Placement::Center,
            StepContent::new(
                "¡Bienvenido a PIK Visual! 🎉",
                "Te vamos a mostrar las principales características de esta herramienta \
                 para aprender programación con bloques visuales.",
            ),
        ),
        Step::new(
            TargetRef::region(TITLE),
            Placement::Bottom,
            StepContent::new(
                "PIK Visual",
                "Una herramienta educativa para aprender programación de forma visual usando bloques.",
            ),
        ),
        Step::new(
            TargetRef::region(BLOCKS_EDITOR),
            Placement::Right,
            StepContent::new(
                "Editor de Bloques 🧩",
                "Aquí es donde construyes tus programas arrastrando bloques.",
            ),
        ),
        Step::new(
            TargetRef::region(BLOCKS_BUTTON),
            Placement::Bottom,
            StepContent::new(
                "Paleta de Bloques 🎨",
                "Haz clic aquí para abrir la paleta con todos los bloques disponibles.",
            ),
        ),
        Step::new(
            TargetRef::region(CODE_VIEW),
            Placement::Left,
            StepContent::new(
                "Código PIK 📝",
                "Aquí puedes ver el código que generan tus bloques en el lenguaje PIK.",
            ),
        ),
        Step::new(
            TargetRef::region(CONTROLS),
            Placement::Top,
            StepContent::new("Controles 🎮", "Gestiona tu código con estos controles."),
        ),
        Step::new(
            TargetRef::region(RUN_BUTTON),
            Placement::Left,
            StepContent::new(
                "Ejecutar Código ▶️",
                "Aquí ejecutas tu programa y ves los resultados. \
                 En el siguiente paso crearemos un programa de ejemplo.",
            ),
        ),
        Step::new(
            TargetRef::region(CONSOLE),
            Placement::Left,
            StepContent::new(
                "Consola de Salida 🖥️",
                "Aquí aparecen los resultados de tu programa. ¡Ahora vamos a crear un programa de ejemplo!",
            ),
        )
        .checkpoint(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::detector::ActionDetector;
    use crate::tour::surface::UiSnapshot;

    #[test]
    fn test_builtin_catalogs_validate() {
        let interactive = interactive().unwrap();
        assert_eq!(interactive.len(), 10);
        assert_eq!(interactive.checkpoint(), Some(9));

        let overview = overview().unwrap();
        assert_eq!(overview.len(), 8);
        assert_eq!(overview.checkpoint(), Some(7));
        assert!(overview.steps().all(|step| !step.gated));
    }

    #[test]
    fn test_interactive_gating() {
        let catalog = interactive().unwrap();
        let gated: Vec<usize> = catalog.steps().filter(|s| s.gated).map(|s| s.id).collect();
        assert_eq!(gated, vec![2, 3, 4, 5, 6, 8]);
        assert!(!catalog.step_at(0).gated);
    }

    #[test]
    fn test_repetir_step_accepts_english_rendering() {
        let catalog = interactive().unwrap();
        let detector = ActionDetector::for_catalog(&catalog);
        let rule = catalog.step_at(3).rule.as_ref().unwrap();

        let english = UiSnapshot::new().with_region(regions::CANVAS, "repeat 5 times");
        assert!(detector.evaluate(rule, &english));

        let from_code = UiSnapshot::new().with_code("repetir 5 veces:\n");
        assert!(detector.evaluate(rule, &from_code));

        let unrelated = UiSnapshot::new().with_region(regions::CANVAS, "mostrar");
        assert!(!detector.evaluate(rule, &unrelated));
    }

    #[test]
    fn test_open_palette_needs_panel() {
        let catalog = interactive().unwrap();
        let detector = ActionDetector::for_catalog(&catalog);
        let rule = catalog.step_at(2).rule.as_ref().unwrap();

        assert!(!detector.evaluate(rule, &UiSnapshot::new()));
        let open = UiSnapshot::new().with_region(regions::BLOCKS_PANEL, "");
        assert!(detector.evaluate(rule, &open));
    }

    #[test]
    fn test_catalog_kind_names() {
        assert_eq!(CatalogKind::default(), CatalogKind::Interactive);
        assert_eq!(CatalogKind::Overview.to_string(), "overview");
        assert_eq!(CatalogKind::Overview.catalog().unwrap().len(), 8);
    }
}
