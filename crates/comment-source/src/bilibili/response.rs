//! Wire shapes of the Bilibili comment endpoints.

use serde::{Deserialize, Deserializer};

use crate::error::{Result, SourceError};
use crate::models::Comment;

/// Standard `{code, message, data}` wrapper.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Result<T> {
        if self.code != 0 {
            return Err(SourceError::api(self.code, self.message));
        }
        self.data
            .ok_or_else(|| SourceError::InvalidResponse("response carried no data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViewData {
    pub aid: u64,
    pub bvid: String,
    pub title: String,
    pub stat: Option<ViewStat>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViewStat {
    pub reply: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplyPageData {
    pub page: Option<PageInfo>,
    pub replies: Option<Vec<ReplyItem>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageInfo {
    #[serde(default)]
    pub count: u64,
}

/// Reply list without page accounting (sub-replies and the lazy feed).
#[derive(Debug, Deserialize)]
pub(crate) struct ReplyListData {
    pub replies: Option<Vec<ReplyItem>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NavData {
    pub wbi_img: WbiImg,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WbiImg {
    pub img_url: String,
    pub sub_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplyItem {
    pub rpid: u64,
    pub oid: u64,
    #[serde(default)]
    pub root: u64,
    #[serde(default)]
    pub parent: u64,
    #[serde(default)]
    pub rcount: u64,
    #[serde(default)]
    pub like: u64,
    pub ctime: i64,
    pub member: Member,
    pub content: Content,
    pub reply_control: Option<ReplyControl>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Member {
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub mid: u64,
    pub uname: String,
    #[serde(default)]
    pub avatar: String,
    pub sex: Option<String>,
    pub level_info: Option<LevelInfo>,
    pub fans_detail: Option<FansDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LevelInfo {
    pub current_level: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FansDetail {
    #[serde(default)]
    pub medal_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Content {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplyControl {
    pub location: Option<String>,
}

fn u64_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

impl From<ReplyItem> for Comment {
    fn from(item: ReplyItem) -> Self {
        let fans_medal = item
            .member
            .fans_detail
            .map(|detail| detail.medal_name)
            .filter(|name| !name.is_empty());
        let location = item
            .reply_control
            .and_then(|control| control.location)
            .filter(|location| !location.is_empty());

        Comment {
            rpid: item.rpid,
            oid: item.oid,
            mid: item.member.mid,
            user: item.member.uname,
            avatar: item.member.avatar,
            content: item.content.message,
            ctime: item.ctime,
            likes: item.like,
            reply_count: item.rcount,
            parent: item.parent,
            root: item.root,
            sex: item.member.sex,
            level: item.member.level_info.map(|info| info.current_level),
            fans_medal,
            location,
        }
    }
}

pub(crate) fn into_comments(replies: Option<Vec<ReplyItem>>) -> Vec<Comment> {
    replies
        .unwrap_or_default()
        .into_iter()
        .map(Comment::from)
        .collect()
}
