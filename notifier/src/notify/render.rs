//! Rendering of deployment snapshots into Slack attachments

use nomad_models::Deployment;
use slack_models::{Attachment, AttachmentAction, AttachmentField, ConfirmationField};

/// Status description Nomad reports while canaries wait for promotion
pub const MANUAL_PROMOTION_DESCRIPTION: &str =
    "Deployment is running but requires manual promotion";

/// Action name of the promote button
pub const PROMOTE_ACTION: &str = "promote";

/// Action name of the fail button
pub const FAIL_ACTION: &str = "fail";

pub const COLOR_FAILED: &str = "#dd4e58";
pub const COLOR_RUNNING: &str = "#1daeff";
pub const COLOR_SUCCESSFUL: &str = "#36a64f";
pub const COLOR_OTHER: &str = "#D3D3D3";

/// Render the message body for a deployment
///
/// Depends only on its arguments: `ui_base_url` is the Nomad UI address and
/// `timestamp` the render time in Unix seconds.
pub fn render(deployment: &Deployment, ui_base_url: &str, timestamp: i64) -> Vec<Attachment> {
    let link = deployment_link(ui_base_url, &deployment.job_id);

    vec![Attachment {
        fallback: "deployment update".to_string(),
        color: color_for_status(&deployment.status).to_string(),
        callback_id: deployment.id.clone(),
        author_name: format!("{}のデプロイで更新がありました。", deployment.job_id),
        author_link: link.clone(),
        title: headline_for_description(&deployment.status_description).to_string(),
        title_link: link,
        fields: task_group_fields(deployment),
        actions: actions_for_description(&deployment.status_description),
        footer: format!("Deploy ID: {}", deployment.id),
        ts: Some(timestamp),
    }]
}

/// Link to the deployments view of a job in the Nomad UI
pub fn deployment_link(ui_base_url: &str, job_id: &str) -> String {
    format!(
        "{}/ui/jobs/{}/deployments",
        ui_base_url.trim_end_matches('/'),
        job_id
    )
}

pub fn color_for_status(status: &str) -> &'static str {
    match status {
        "failed" => COLOR_FAILED,
        "running" => COLOR_RUNNING,
        "successful" => COLOR_SUCCESSFUL,
        _ => COLOR_OTHER,
    }
}

/// Localized headline for known descriptions, anything else verbatim
pub fn headline_for_description(description: &str) -> &str {
    match description {
        "Deployment completed successfully" => "デプロイメントが正常に完了しました。",
        "Failed due to progress deadline" => "タイムアウトしたため失敗しました。",
        "Deployment is running" => "デプロイメントが開始されました。",
        other => other,
    }
}

// Task groups are kept in a BTreeMap, so fields come out in name order.
fn task_group_fields(deployment: &Deployment) -> Vec<AttachmentField> {
    deployment
        .task_groups
        .iter()
        .map(|(name, group)| AttachmentField {
            title: format!("Task Group: {}", name),
            value: format!(
                "Healthy: {}, 配置数: {}, カナリア: {}",
                group.healthy_allocs, group.placed_allocs, group.desired_canaries
            ),
            short: false,
        })
        .collect()
}

fn actions_for_description(description: &str) -> Vec<AttachmentAction> {
    if description != MANUAL_PROMOTION_DESCRIPTION {
        return Vec::new();
    }

    vec![
        AttachmentAction {
            name: PROMOTE_ACTION.to_string(),
            text: "Promote :heavy_check_mark:".to_string(),
            action_type: "button".to_string(),
            value: PROMOTE_ACTION.to_string(),
            ..Default::default()
        },
        AttachmentAction {
            name: FAIL_ACTION.to_string(),
            text: "Fail :boom:".to_string(),
            action_type: "button".to_string(),
            value: FAIL_ACTION.to_string(),
            style: "danger".to_string(),
            confirm: Some(ConfirmationField {
                title: "あってる?".to_string(),
                text: ":nomad-sad: :nomad-sad: :nomad-sad: :nomad-sad: :nomad-sad:".to_string(),
                ok_text: "Fail".to_string(),
                dismiss_text: "Woops!".to_string(),
            }),
        },
    ]
}
