use console::Style;
use fieldtrace_core::pipeline::OrchestratorState;
use fieldtrace_core::session::{Session, StageStatus};
use fieldtrace_core::stages::StageId;

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    ok: Style,
    failed: Style,
    pending: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            ok: Style::new().green(),
            failed: Style::new().red().bold(),
            pending: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }

    fn status(&self, status: StageStatus) -> &Style {
        match status {
            StageStatus::Succeeded => &self.ok,
            StageStatus::Failed => &self.failed,
            StageStatus::Running | StageStatus::NotStarted => &self.pending,
        }
    }
}

pub fn print_run_summary(session: &Session, state: &OrchestratorState, base_url: &str) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Field Trace"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(11)));
    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Point"),
        s.value.apply_to(session.point())
    );
    if let Some(pixel) = session.pixel_point() {
        let (x, y) = pixel.rounded();
        println!(
            "  {:<14}{}",
            s.label.apply_to("Pixel"),
            s.value.apply_to(format!("({x}, {y})"))
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("State"),
        s.value.apply_to(state)
    );
    println!();

    for id in StageId::ALL {
        let stage = session.stage(id);
        let status = stage.status();
        println!(
            "  {:<18}{}",
            s.label.apply_to(id),
            s.status(status).apply_to(status)
        );
        for param in stage.params() {
            println!(
                "    {:<16}{}",
                s.label.apply_to(param.spec.name),
                s.value.apply_to(param.spec.format(param.value))
            );
        }
        if let Some(artifact) = stage.artifact() {
            println!(
                "    {:<16}{}",
                s.label.apply_to("artifact"),
                s.path.apply_to(artifact.url(base_url))
            );
            if let Some(preview) = artifact.preview_url(base_url) {
                println!(
                    "    {:<16}{}",
                    s.label.apply_to("preview"),
                    s.path.apply_to(preview)
                );
            }
        }
        if let Some(reason) = stage.failure() {
            println!(
                "    {:<16}{}",
                s.label.apply_to("error"),
                s.failed.apply_to(reason)
            );
        }
    }
    println!();
}
