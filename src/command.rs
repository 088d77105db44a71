/// Everything the UI can ask the viewer to do. Preset names are passed
/// through as strings; unknown names are ignored by the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleWireframe,
    ChangeLighting(String),
    ChangeView(String),
    Show3D,
    ShowImage,
    LoadModel(String),
}
