/// Hero-pane rendering for the machine panel.
///
/// Four time charts over the visible slice: CPU, memory, disk I/O and
/// network I/O. Rate charts start at the second sample, the first has no
/// predecessor to diff against.
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::Color,
    Frame,
};

use gpudash_metrics::{reading::MachineReading, Snapshot};
use gpudash_ui::chart::{points, render_time_chart, Trace, YScale};

pub fn render_hero_content(f: &mut Frame, area: Rect, window: &[Snapshot<MachineReading>]) {

    let rows = Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)]).split(area);
    let top = Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).split(rows[0]);
    let bottom =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).split(rows[1]);

    let cpu = [Trace {
        name: "cpu".into(),
        color: Color::Green,
        points: points(window, |s| Some(s.reading.cpu_utilization)),
    }];
    render_time_chart(f, top[0], "CPU Utilization", &cpu, YScale::Percent);

    let mem = [Trace {
        name: "used".into(),
        color: Color::Yellow,
        points: points(window, |s| Some(s.reading.memory_usage as f64)),
    }];
    render_time_chart(f, top[1], "Memory", &mem, YScale::Bytes);

    let disk = [
        Trace {
            name: "read".into(),
            color: Color::Cyan,
            points: points(window, |s| s.rates.map(|r| r.disk_read_current as f64)),
        },
        Trace {
            name: "write".into(),
            color: Color::Magenta,
            points: points(window, |s| s.rates.map(|r| r.disk_write_current as f64)),
        },
    ];
    render_time_chart(f, bottom[0], "Disk I/O per sample", &disk, YScale::Bytes);

    let net = [
        Trace {
            name: "rx".into(),
            color: Color::LightBlue,
            points: points(window, |s| s.rates.map(|r| r.network_read_current as f64)),
        },
        Trace {
            name: "tx".into(),
            color: Color::LightRed,
            points: points(window, |s| s.rates.map(|r| r.network_write_current as f64)),
        },
    ];
    render_time_chart(f, bottom[1], "Network I/O per sample", &net, YScale::Bytes);
}
