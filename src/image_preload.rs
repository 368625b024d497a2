//! EOS image preload
//!
//! Copies an EOS image from an HTTPS server to the device's flash in one command
//! batch: enter privileged mode, switch VRF, copy.

use crate::context::{ArgBag, ExecutionContext};
use crate::device::first_error;
use crate::error::UserWarning;
use anyhow::{Context, Result};
use reqwest::Url;

/// Arguments of one preload run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePreload {
    pub authority: String,
    pub path: String,
    pub eos: String,
    pub vrf: String,
}

impl ImagePreload {
    pub fn from_args(args: &ArgBag) -> Result<Self, UserWarning> {
        Ok(Self {
            authority: args.require("authority")?.to_string(),
            path: args.require("path")?.to_string(),
            eos: args.require("eos")?.to_string(),
            vrf: args.require("vrf")?.to_string(),
        })
    }

    /// `path + eos` resolved against `https://{authority}`
    ///
    /// The result is a normalized URL: the host is lowercased, the default port 443
    /// is dropped and characters not allowed in a path (such as spaces) are
    /// percent-encoded. The copy command carries this normalized form.
    pub fn image_url(&self) -> Result<Url> {
        let base = Url::parse(&format!("https://{}", self.authority))
            .with_context(|| format!("invalid image server authority '{}'", self.authority))?;
        let reference = format!("{}{}", self.path, self.eos);
        base.join(&reference)
            .with_context(|| format!("invalid image path '{}'", reference))
    }

    /// The ordered batch sent to the device
    pub fn commands(&self, image_url: &Url) -> Vec<String> {
        vec![
            "enable".to_string(),
            format!("cli vrf {}", self.vrf),
            format!("copy {} flash:", image_url),
        ]
    }

    pub async fn run(&self, ctx: &dyn ExecutionContext) -> Result<()> {
        let image_url = self.image_url()?;
        ctx.alog(&format!("Downloading EOS image from {}", image_url));

        let responses = ctx.run_device_cmds(&self.commands(&image_url)).await?;
        // later commands only ran if earlier ones succeeded, so the first error is the cause
        if let Some(error) = first_error(&responses) {
            return Err(UserWarning::new(format!("Preloading image failed with: {}", error)).into());
        }

        ctx.alog("Downloading of Eos image completed successfully");
        Ok(())
    }
}

/// Entry point for the image preload action
pub async fn run(ctx: &dyn ExecutionContext) -> Result<()> {
    ImagePreload::from_args(ctx.args())?.run(ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::CommandResponse;
    use crate::error::user_warning;
    use crate::testing::MockContext;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn preload_args() -> ArgBag {
        [
            ("authority", "x.example.com"),
            ("path", "/images/"),
            ("eos", "EOS.swi"),
            ("vrf", "default"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_url_and_command_batch() {
        let preload = ImagePreload::from_args(&preload_args()).expect("args");
        let url = preload.image_url().expect("url");
        assert_eq!(url.as_str(), "https://x.example.com/images/EOS.swi");
        assert_eq!(
            preload.commands(&url),
            vec![
                "enable",
                "cli vrf default",
                "copy https://x.example.com/images/EOS.swi flash:",
            ]
        );
    }

    #[test]
    fn test_relative_path_joins_under_root() {
        let mut preload = ImagePreload::from_args(&preload_args()).expect("args");
        preload.path = "images/".into();
        assert_eq!(
            preload.image_url().expect("url").as_str(),
            "https://x.example.com/images/EOS.swi"
        );
    }

    #[test]
    fn test_image_url_is_normalized() {
        let preload = ImagePreload {
            authority: "X.Example.com:443".into(),
            path: "/images/".into(),
            eos: "EOS 4.swi".into(),
            vrf: "mgmt".into(),
        };
        let url = preload.image_url().expect("url");
        assert_eq!(url.as_str(), "https://x.example.com/images/EOS%204.swi");
        assert_eq!(
            preload.commands(&url)[2],
            "copy https://x.example.com/images/EOS%204.swi flash:"
        );
    }

    #[test]
    fn test_missing_argument() {
        let args: ArgBag = [("authority", "x"), ("path", "/"), ("eos", "EOS.swi")]
            .into_iter()
            .collect();
        let err = ImagePreload::from_args(&args).unwrap_err();
        assert_eq!(err.message(), "Missing required argument: vrf");
    }

    #[tokio::test]
    async fn test_success_logs_once() {
        let ctx = MockContext::new(preload_args()).with_device_responses(vec![
            CommandResponse::ok(json!({})),
            CommandResponse::ok(json!({})),
            CommandResponse::ok(json!({"messages": ["Copy completed successfully."]})),
        ]);

        run(&ctx).await.expect("preload failed");

        assert_eq!(
            ctx.submitted_batches(),
            vec![vec![
                "enable".to_string(),
                "cli vrf default".to_string(),
                "copy https://x.example.com/images/EOS.swi flash:".to_string(),
            ]]
        );
        assert_eq!(
            ctx.logs(),
            vec![
                "Downloading EOS image from https://x.example.com/images/EOS.swi".to_string(),
                "Downloading of Eos image completed successfully".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_first_error_wins() {
        let ctx = MockContext::new(preload_args()).with_device_responses(vec![
            CommandResponse::ok(json!({})),
            CommandResponse::failed("VRF default unavailable"),
            CommandResponse::failed("copy failed"),
        ]);

        let err = run(&ctx).await.unwrap_err();
        assert_eq!(
            user_warning(&err).map(UserWarning::message),
            Some("Preloading image failed with: VRF default unavailable")
        );
        assert!(!ctx
            .logs()
            .iter()
            .any(|l| l.contains("completed successfully")));
    }

    #[tokio::test]
    async fn test_channel_failure_is_fatal() {
        let ctx = MockContext::new(preload_args());
        let err = run(&ctx).await.unwrap_err();
        assert!(user_warning(&err).is_none());
    }
}
