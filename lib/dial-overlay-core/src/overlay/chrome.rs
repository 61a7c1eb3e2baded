use crate::config::Config;
use crate::error::OverlayResult;
use crate::layout::toggle_button_position;
use crate::overlay::ChatOverlayManagerOptions;
use crate::platform::{ElementId, HostDocument};
use crate::style::set_styles;

const CLOSE_ICON: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="18" height="18" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2"><path d="M18 6 6 18M6 6l12 12"/></svg>"#;
const FULLSCREEN_ICON: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="18" height="18" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2"><path d="M4 9V4h5M20 9V4h-5M4 15v5h5M20 15v5h-5"/></svg>"#;

/// The elements a managed overlay lives in.
///
/// ```text
/// container (fixed, slides in and out)
/// ├── controls (close, optional fullscreen)
/// └── overlay_container (hosts the iframe)
/// toggle_button (fixed, same corner)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayChrome {
    pub container: ElementId,
    pub controls: ElementId,
    pub overlay_container: ElementId,
    pub close_button: ElementId,
    pub fullscreen_button: Option<ElementId>,
    pub toggle_button: ElementId,
}

impl OverlayChrome {
    /// Builds the detached element tree. Nothing is attached to `<body>` yet.
    pub fn build(
        document: &dyn HostDocument,
        options: &ChatOverlayManagerOptions,
    ) -> OverlayResult<Self> {
        let container = document.create_element("div");
        set_styles(
            document,
            container,
            [
                ("position", "fixed"),
                ("display", "flex"),
                ("flex-direction", "column"),
                ("overflow", "hidden"),
                ("border-radius", "10px"),
                ("box-shadow", "0 0 10px rgba(0, 0, 0, 0.2)"),
                ("background-color", "#ffffff"),
            ],
        )?;

        let controls = document.create_element("div");
        set_styles(
            document,
            controls,
            [
                ("display", "flex"),
                ("justify-content", "flex-end"),
                ("align-items", "center"),
                ("gap", "4px"),
                ("padding", "4px 8px"),
                ("flex-shrink", "0"),
            ],
        )?;

        let fullscreen_button = if options.allow_fullscreen {
            let button = control_button(document, FULLSCREEN_ICON, "Open fullscreen")?;
            document.append_child(controls, button)?;
            Some(button)
        } else {
            None
        };
        let close_button = control_button(document, CLOSE_ICON, "Close")?;
        document.append_child(controls, close_button)?;

        let overlay_container = document.create_element("div");
        set_styles(
            document,
            overlay_container,
            [("flex-grow", "1"), ("width", "100%"), ("height", "100%")],
        )?;

        document.append_child(container, controls)?;
        document.append_child(container, overlay_container)?;

        let toggle_button = build_toggle_button(document, options)?;

        Ok(Self {
            container,
            controls,
            overlay_container,
            close_button,
            fullscreen_button,
            toggle_button,
        })
    }

    pub fn attach(&self, document: &dyn HostDocument) -> OverlayResult<()> {
        let body = document.body();
        document.append_child(body, self.container)?;
        document.append_child(body, self.toggle_button)?;
        Ok(())
    }

    pub fn remove(&self, document: &dyn HostDocument) {
        document.remove_element(self.container);
        document.remove_element(self.toggle_button);
    }
}

fn control_button(document: &dyn HostDocument, icon: &str, title: &str) -> OverlayResult<ElementId> {
    let button = document.create_element("button");
    document.set_attribute(button, "type", "button")?;
    document.set_attribute(button, "title", title)?;
    document.set_inner_html(button, icon)?;
    set_styles(
        document,
        button,
        [
            ("display", "flex"),
            ("align-items", "center"),
            ("justify-content", "center"),
            ("padding", "4px"),
            ("border", "none"),
            ("background", "transparent"),
            ("cursor", "pointer"),
        ],
    )?;
    Ok(button)
}

fn build_toggle_button(
    document: &dyn HostDocument,
    options: &ChatOverlayManagerOptions,
) -> OverlayResult<ElementId> {
    let defaults = Config::toggle_button();
    let width = options.icon_width.as_deref().unwrap_or(&defaults.size);
    let height = options.icon_height.as_deref().unwrap_or(&defaults.size);
    let background = options.icon_bg_color.as_deref().unwrap_or(&defaults.background);
    let color = options.icon_color.as_deref().unwrap_or(&defaults.color);
    let icon = options.icon_svg.as_deref().unwrap_or(&defaults.icon_svg);
    let z_index = options.layout_size().z_index;

    let button = document.create_element("button");
    document.set_attribute(button, "type", "button")?;
    document.set_attribute(button, "title", "Open chat")?;
    document.set_inner_html(button, icon)?;
    set_styles(
        document,
        button,
        [
            ("position", "fixed"),
            ("display", "flex"),
            ("align-items", "center"),
            ("justify-content", "center"),
            ("width", width),
            ("height", height),
            ("border-radius", "50%"),
            ("border", "none"),
            ("cursor", "pointer"),
            ("background-color", background),
            ("color", color),
            ("z-index", z_index.as_str()),
        ],
    )?;

    let placement = toggle_button_position(options.position, &Config::edge_offset());
    set_styles(document, button, placement.edges())?;

    Ok(button)
}
