/// 设备 topic 解析结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopic {
    pub practice_id: String,
    pub category: String,
    pub device_id: String,
    pub action: String,
}

/// topic 构造器（根层级可配置）。
#[derive(Debug, Clone)]
pub struct Topics {
    root: String,
}

impl Topics {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            root: root.trim_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// `{root}/{practice}/led/{controller}/command`
    pub fn led_command(&self, practice_id: &str, controller_id: &str) -> String {
        self.device(practice_id, "led", controller_id, "command")
    }

    /// `{root}/{practice}/wayfinding/activate`
    pub fn wayfinding_activate(&self, practice_id: &str) -> String {
        format!("{}/{}/wayfinding/activate", self.root, practice_id)
    }

    /// `{root}/{practice}/events`
    pub fn events(&self, practice_id: &str) -> String {
        format!("{}/{}/events", self.root, practice_id)
    }

    pub fn device(&self, practice_id: &str, category: &str, device_id: &str, action: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.root, practice_id, category, device_id, action
        )
    }

    /// 读卡器扫描上报：`{root}/+/nfc/+/scan`
    pub fn scan_filter(&self) -> String {
        format!("{}/+/nfc/+/scan", self.root)
    }

    /// 设备状态上报：`{root}/+/+/+/status`
    pub fn status_filter(&self) -> String {
        format!("{}/+/+/+/status", self.root)
    }

    /// 解析五层设备 topic；层级数不符或根不匹配时返回 None。
    pub fn parse_device_topic(&self, topic: &str) -> Option<DeviceTopic> {
        let rest = topic.strip_prefix(&self.root)?.strip_prefix('/')?;
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() != 4 || parts.iter().any(|part| part.is_empty()) {
            return None;
        }
        Some(DeviceTopic {
            practice_id: parts[0].to_string(),
            category: parts[1].to_string(),
            device_id: parts[2].to_string(),
            action: parts[3].to_string(),
        })
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::new("practice")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_parses_device_topics() {
        let topics = Topics::new("practice/");
        let topic = topics.led_command("p1", "ctrl-1");
        assert_eq!(topic, "practice/p1/led/ctrl-1/command");
        let parsed = topics.parse_device_topic("practice/p1/nfc/r1/scan").expect("parsed");
        assert_eq!(parsed.practice_id, "p1");
        assert_eq!(parsed.category, "nfc");
        assert_eq!(parsed.device_id, "r1");
        assert_eq!(parsed.action, "scan");
        assert!(topics.parse_device_topic("practice/p1/events").is_none());
        assert!(topics.parse_device_topic("other/p1/nfc/r1/scan").is_none());
    }
}
