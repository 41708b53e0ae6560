//! Plain-text rendering of the tree statistics panel.

use compute::{MeshOutcome, MeshReport, MeshStats};
use runtime::{RefreshEvent, Subscriber};

pub const OUT_OF_MESH: &str = "メッシュ外です。";
pub const OUTSIDE_SURVEY_AREA: &str = "調査範囲外";
pub const NO_TREES: &str = "立木なし";

pub fn render_sidebar(report: &MeshReport) -> String {
    match &report.outcome {
        MeshOutcome::OutOfMesh => OUT_OF_MESH.to_string(),
        MeshOutcome::OutsideSurveyArea { mesh } => {
            format!("メッシュ番号：{}\n{OUTSIDE_SURVEY_AREA}", mesh.id)
        }
        MeshOutcome::NoTrees { mesh, .. } => format!("メッシュ番号：{}\n{NO_TREES}", mesh.id),
        MeshOutcome::Stats { mesh, overlap, stats } => {
            let mut lines = vec![
                "立木情報".to_string(),
                format!("メッシュ番号：{}", mesh.id),
                format!("調査面積：{:.1} ㎡", overlap.total_m2),
            ];
            stats_lines(stats, &mut lines);
            lines.join("\n")
        }
    }
}

fn stats_lines(stats: &MeshStats, lines: &mut Vec<String>) {
    let species = stats
        .species
        .iter()
        .map(|s| format!("{}: {:.1}%", s.species, s.percent))
        .collect::<Vec<_>>()
        .join(", ");

    lines.push(format!("本数：{} 本（{:.0} 本/ha）", stats.count, stats.density_per_ha));
    lines.push(format!("樹種構成：{species}"));
    lines.push(format!("平均樹高：{:.1} m", stats.mean_height_m));
    lines.push(format!("平均DBH：{:.1} cm", stats.mean_dbh_cm));
    lines.push(format!(
        "胸高断面積合計：{:.2} ㎡（{:.2} ㎡/ha）",
        stats.basal_area.total, stats.basal_area.per_ha
    ));
    lines.push(format!(
        "材積合計：{:.2} ㎥（{:.2} ㎥/ha）",
        stats.volume.total, stats.volume.per_ha
    ));
    lines.push(match stats.shape_ratio.mean {
        Some(v) => format!("形状比平均：{v:.2}"),
        None => "形状比平均：-".to_string(),
    });
    if !stats.shape_ratio.excluded.is_empty() {
        lines.push(format!(
            "（DBH 0 の {} 本を形状比から除外）",
            stats.shape_ratio.excluded.len()
        ));
    }
    lines.push(match stats.spacing.relative_spacing_percent {
        Some(v) => format!("相対幹距比：{v:.1} %"),
        None => "相対幹距比：-".to_string(),
    });

    if let Some(cut) = &stats.cut {
        lines.push(String::new());
        lines.push("伐採情報".to_string());
        lines.push(format!("伐採本数：{} 本", cut.count));
        lines.push(format!("本数伐採率：{:.1}%", cut.count_rate_percent));
        lines.push(format!("胸高断面積伐採率：{:.1}%", cut.basal_area_rate_percent));
        lines.push(format!("材積伐採率：{:.1}%", cut.volume_rate_percent));
    }
}

/// Prints the panel for every refresh it receives.
#[derive(Debug, Default)]
pub struct SidebarPrinter {
    pub rendered: usize,
}

impl Subscriber for SidebarPrinter {
    fn name(&self) -> &str {
        "sidebar"
    }

    fn on_refresh(&mut self, event: &RefreshEvent) {
        self.rendered += 1;
        let area = event.area.as_ref().map(|a| a.as_str()).unwrap_or("-");
        println!(
            "#{} [{:.6}, {:.6}] area={area}\n{}\n",
            event.generation,
            event.center[0],
            event.center[1],
            render_sidebar(&event.report)
        );
    }
}
