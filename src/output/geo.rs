//! 节点服务器的地理位置查询，用于重命名

use lazy_static::lazy_static;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::OutputError;

pub const DEFAULT_GEO_API: &str = "http://ip-api.com/json";

const UNKNOWN_FLAG: &str = "🏳️";
const UNKNOWN_COUNTRY: &str = "未知";

lazy_static! {
    static ref COUNTRY_NAMES: HashMap<&'static str, &'static str> = [
        ("US", "美国"), ("CN", "中国"), ("GB", "英国"), ("UK", "英国"), ("JP", "日本"),
        ("DE", "德国"), ("FR", "法国"), ("RU", "俄罗斯"), ("SG", "新加坡"), ("HK", "香港"),
        ("TW", "台湾"), ("KR", "韩国"), ("CA", "加拿大"), ("AU", "澳大利亚"), ("NL", "荷兰"),
        ("IT", "意大利"), ("ES", "西班牙"), ("SE", "瑞典"), ("NO", "挪威"), ("DK", "丹麦"),
        ("FI", "芬兰"), ("CH", "瑞士"), ("AT", "奥地利"), ("BE", "比利时"), ("BR", "巴西"),
        ("IN", "印度"), ("TH", "泰国"), ("MY", "马来西亚"), ("VN", "越南"), ("PH", "菲律宾"),
        ("ID", "印度尼西亚"), ("UA", "乌克兰"), ("TR", "土耳其"), ("IL", "以色列"),
        ("AE", "阿联酋"), ("SA", "沙特阿拉伯"), ("EG", "埃及"), ("ZA", "南非"),
        ("NG", "尼日利亚"), ("KE", "肯尼亚"), ("RO", "罗马尼亚"), ("PL", "波兰"),
        ("CZ", "捷克"), ("HU", "匈牙利"), ("BG", "保加利亚"), ("HR", "克罗地亚"),
        ("SI", "斯洛文尼亚"), ("SK", "斯洛伐克"), ("LT", "立陶宛"), ("LV", "拉脱维亚"),
        ("EE", "爱沙尼亚"), ("PT", "葡萄牙"), ("GR", "希腊"), ("IE", "爱尔兰"),
        ("LU", "卢森堡"), ("MT", "马耳他"), ("CY", "塞浦路斯"), ("IS", "冰岛"),
        ("MX", "墨西哥"), ("AR", "阿根廷"), ("CL", "智利"), ("CO", "哥伦比亚"),
        ("PE", "秘鲁"), ("VE", "委内瑞拉"), ("EC", "厄瓜多尔"), ("UY", "乌拉圭"),
        ("PY", "巴拉圭"), ("BO", "玻利维亚"), ("CR", "哥斯达黎加"), ("PA", "巴拿马"),
        ("GT", "危地马拉"), ("HN", "洪都拉斯"), ("SV", "萨尔瓦多"), ("NI", "尼加拉瓜"),
        ("BZ", "伯利兹"), ("JM", "牙买加"), ("TT", "特立尼达和多巴哥"), ("BB", "巴巴多斯"),
        ("GD", "格林纳达"), ("LC", "圣卢西亚"), ("VC", "圣文森特和格林纳丁斯"),
        ("AG", "安提瓜和巴布达"), ("DM", "多米尼克"), ("KN", "圣基茨和尼维斯"),
        ("BS", "巴哈马"), ("CU", "古巴"), ("DO", "多米尼加"), ("HT", "海地"),
        ("PR", "波多黎各"), ("VI", "美属维尔京群岛"), ("GU", "关岛"), ("AS", "美属萨摩亚"),
        ("MP", "北马里亚纳群岛"), ("PW", "帕劳"), ("FM", "密克罗尼西亚"),
        ("MH", "马绍尔群岛"), ("KI", "基里巴斯"), ("TV", "图瓦卢"), ("NR", "瑙鲁"),
        ("WS", "萨摩亚"), ("TO", "汤加"), ("FJ", "斐济"), ("VU", "瓦努阿图"),
        ("SB", "所罗门群岛"), ("PG", "巴布亚新几内亚"), ("NC", "新喀里多尼亚"),
        ("PF", "法属波利尼西亚"), ("WF", "瓦利斯和富图纳"), ("CK", "库克群岛"),
        ("NU", "纽埃"), ("TK", "托克劳"), ("SC", "塞舌尔"),
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpLocation {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
}

#[derive(Debug, Clone)]
pub struct GeoLocator {
    client: reqwest::Client,
    base_url: String,
}

impl GeoLocator {
    pub fn new(timeout: Duration) -> Result<Self, OutputError> {
        Self::with_base_url(DEFAULT_GEO_API, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, OutputError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 查询服务器地址（IP 或域名）所在国家
    pub async fn lookup(&self, server: &str) -> Result<IpLocation, OutputError> {
        let url = format!("{}/{}?fields=country,countryCode", self.base_url, server);
        let location = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<IpLocation>()
            .await?;
        Ok(location)
    }
}

/// 国家代码对应的中文名称
pub fn country_name(country_code: &str) -> &'static str {
    COUNTRY_NAMES
        .get(country_code.to_ascii_uppercase().as_str())
        .copied()
        .unwrap_or(UNKNOWN_COUNTRY)
}

/// 两位国家代码转换为旗帜 emoji，无法识别时返回白旗
pub fn country_flag(country_code: &str) -> String {
    let code = match country_code.to_ascii_uppercase().as_str() {
        "UK" => "GB".to_string(),
        other => other.to_string(),
    };

    if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
        return UNKNOWN_FLAG.to_string();
    }

    code.bytes()
        .filter_map(|b| char::from_u32(0x1F1E6 + u32::from(b - b'A')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_country_flag() {
        assert_eq!(country_flag("HK"), "🇭🇰");
        assert_eq!(country_flag("jp"), "🇯🇵");
        assert_eq!(country_flag("UK"), "🇬🇧");
        assert_eq!(country_flag(""), UNKNOWN_FLAG);
        assert_eq!(country_flag("X1"), UNKNOWN_FLAG);
    }

    #[test]
    fn test_country_name() {
        assert_eq!(country_name("HK"), "香港");
        assert_eq!(country_name("sg"), "新加坡");
        assert_eq!(country_name("UK"), "英国");
        assert_eq!(country_name("ZZ"), "未知");
        assert_eq!(country_name(""), "未知");
    }

    #[tokio::test]
    async fn test_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/1.2.3.4"))
            .and(query_param("fields", "country,countryCode"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"country": "Japan", "countryCode": "JP"})),
            )
            .mount(&server)
            .await;

        let base_url = format!("{}/json", server.uri());
        let geo = GeoLocator::with_base_url(&base_url, Duration::from_secs(5)).unwrap();
        let location = geo.lookup("1.2.3.4").await.unwrap();
        assert_eq!(location.country_code, "JP");
        assert_eq!(location.country, "Japan");

        assert!(geo.lookup("5.6.7.8").await.is_err());
    }
}
