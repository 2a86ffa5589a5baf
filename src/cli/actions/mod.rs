pub mod run;

use crate::exporter::ExporterSettings;

#[derive(Debug)]
pub enum Action {
    Run { settings: ExporterSettings },
}
