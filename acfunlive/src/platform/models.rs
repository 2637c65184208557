#![allow(dead_code)]

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct VisitorLoginResponse {
    pub result: i32,
    #[serde(rename = "userId", default)]
    pub user_id: i64,
    #[serde(rename = "acfun.api.visitor_st", default)]
    pub visitor_st: String,
}

#[derive(Debug, Deserialize)]
pub struct StartPlayResponse {
    pub result: i32,
    pub data: Option<StartPlayData>,
}

#[derive(Debug, Deserialize)]
pub struct StartPlayData {
    #[serde(rename = "liveId")]
    pub live_id: String,
    pub caption: String,
    #[serde(rename = "videoPlayRes")]
    pub video_play_res: String,
}

#[derive(Debug, Deserialize)]
pub struct VideoPlayRes {
    #[serde(rename = "liveAdaptiveManifest")]
    pub live_adaptive_manifest: Vec<LiveAdaptiveManifest>,
}

#[derive(Debug, Deserialize)]
pub struct LiveAdaptiveManifest {
    #[serde(rename = "adaptationSet")]
    pub adaptation_set: AdaptationSet,
}

#[derive(Debug, Deserialize)]
pub struct AdaptationSet {
    pub representation: Vec<Representation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Representation {
    pub url: String,
    pub bitrate: u32,
    #[serde(default)]
    pub quality_type: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UserInfoResponse {
    pub result: i32,
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
pub struct UserProfile {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelListResponse {
    pub channel_list_data: ChannelListData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelListData {
    #[serde(default)]
    pub live_list: Vec<LiveListItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveListItem {
    pub author_id: u64,
    #[serde(default)]
    pub title: String,
    pub user: LiveListUser,
}

#[derive(Debug, Deserialize)]
pub struct LiveListUser {
    pub name: String,
}
