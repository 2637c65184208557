use async_trait::async_trait;
use rand::distr::{Alphanumeric, SampleString};
use reqwest::{Client, header};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::models::{
    ChannelListResponse, Representation, StartPlayResponse, UserInfoResponse, VideoPlayRes,
    VisitorLoginResponse,
};
use super::{LiveClient, LiveRoom, StreamInfo};
use crate::danmu::{DanmuFeed, SubtitleConfig};
use crate::error::{Error, Result};

/// AcFun live API client.
#[derive(Debug, Clone)]
pub struct AcfunClient {
    client: Client,
}

struct VisitorSession {
    did: String,
    user_id: i64,
    visitor_st: String,
}

impl AcfunClient {
    const VISITOR_LOGIN_URL: &str = "https://id.app.acfun.cn/rest/app/visitor/login";
    const START_PLAY_URL: &str = "https://api.kuaishouzt.com/rest/zt/live/web/startPlay";
    const USER_INFO_URL: &str = "https://live.acfun.cn/rest/pc-direct/user/userInfo";
    const CHANNEL_LIST_URL: &str = "https://live.acfun.cn/api/channel/list";

    /// Upper bound on rooms fetched by [`LiveClient::live_rooms`].
    const CHANNEL_LIST_COUNT: u32 = 10_000;

    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn visitor_login(&self) -> Result<VisitorSession> {
        let did = format!("web_{}", random_name(16));

        let response = self
            .client
            .post(Self::VISITOR_LOGIN_URL)
            .form(&[("sid", "acfun.api.visitor")])
            .header(header::COOKIE, format!("_did={did};"))
            .send()
            .await?
            .json::<VisitorLoginResponse>()
            .await?;

        if response.result != 0 {
            return Err(Error::platform(format!(
                "Visitor login failed: {}",
                response.result
            )));
        }

        Ok(VisitorSession {
            did,
            user_id: response.user_id,
            visitor_st: response.visitor_st,
        })
    }
}

#[async_trait]
impl LiveClient for AcfunClient {
    async fn resolve_stream(&self, uid: u64) -> Result<StreamInfo> {
        let session = self.visitor_login().await?;

        let params = [
            ("subBiz", "mainApp".to_string()),
            ("kpn", "ACFUN_APP".to_string()),
            ("kpf", "PC_WEB".to_string()),
            ("userId", session.user_id.to_string()),
            ("did", session.did),
            ("acfun.api.visitor_st", session.visitor_st),
        ];
        let response = self
            .client
            .post(Self::START_PLAY_URL)
            .header(header::REFERER, "https://live.acfun.cn/")
            .query(&params)
            .form(&[
                ("authorId", uid.to_string()),
                ("pullStreamType", "FLV".to_string()),
            ])
            .send()
            .await?
            .json::<StartPlayResponse>()
            .await?;

        // Any result other than 1 means the broadcaster is not live, or
        // does not exist at all.
        if response.result != 1 {
            debug!(uid, result = response.result, "Broadcaster is offline");
            let name = self.user_name(uid).await?;
            return offline_or_missing(uid, name);
        }

        let data = response
            .data
            .ok_or_else(|| Error::platform("No data found in start play response"))?;
        let play_res: VideoPlayRes = serde_json::from_str(&data.video_play_res)?;

        let best = play_res
            .live_adaptive_manifest
            .into_iter()
            .flat_map(|manifest| manifest.adaptation_set.representation)
            .max_by_key(|rep| rep.bitrate)
            .ok_or_else(|| Error::platform(format!("No streams found for {uid}")))?;

        Ok(StreamInfo {
            hls_url: hls_from_flv(&best.url),
            subtitle: SubtitleConfig::for_resolution(resolution_of(&best)),
            flv_url: best.url,
            stream_name: data.live_id,
            title: data.caption,
        })
    }

    async fn user_name(&self, uid: u64) -> Result<Option<String>> {
        let response = self
            .client
            .get(Self::USER_INFO_URL)
            .query(&[("userId", uid)])
            .send()
            .await?
            .json::<UserInfoResponse>()
            .await?;

        if response.result != 0 {
            return Ok(None);
        }
        Ok(response
            .profile
            .map(|p| p.name)
            .filter(|name| !name.is_empty()))
    }

    async fn live_rooms(&self) -> Result<Vec<LiveRoom>> {
        let response = self
            .client
            .get(Self::CHANNEL_LIST_URL)
            .query(&[
                ("count", Self::CHANNEL_LIST_COUNT.to_string()),
                ("pcursor", "0".to_string()),
            ])
            .send()
            .await?
            .json::<ChannelListResponse>()
            .await?;

        Ok(response
            .channel_list_data
            .live_list
            .into_iter()
            .map(|item| LiveRoom {
                uid: item.author_id,
                name: item.user.name,
                title: item.title,
            })
            .collect())
    }

    async fn open_danmu_feed(
        &self,
        uid: u64,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn DanmuFeed>> {
        Err(Error::Danmu(format!(
            "no danmu transport is configured for AcFun (uid {uid})"
        )))
    }
}

/// Offline when the user exists, not found otherwise.
fn offline_or_missing(uid: u64, name: Option<String>) -> Result<StreamInfo> {
    match name {
        Some(_) => Ok(StreamInfo::offline()),
        None => Err(Error::not_found(uid)),
    }
}

fn random_name(n: usize) -> String {
    Alphanumeric.sample_string(&mut rand::rng(), n)
}

/// The HLS playlist sits next to the FLV stream.
fn hls_from_flv(flv_url: &str) -> String {
    match flv_url.split_once('?') {
        Some((path, query)) => format!("{}?{}", path.replacen(".flv", ".m3u8", 1), query),
        None => flv_url.replacen(".flv", ".m3u8", 1),
    }
}

/// Vertical resolution advertised by a representation, 0 when unknown.
fn resolution_of(rep: &Representation) -> u32 {
    match rep.quality_type.as_str() {
        "BLUE_RAY" => 1080,
        "SUPER" => 720,
        "HIGH" | "STANDARD" => 540,
        _ if rep.name.contains("1080") => 1080,
        _ if rep.name.contains("720") => 720,
        _ if rep.name.contains("540") => 540,
        _ => 0,
    }
}
