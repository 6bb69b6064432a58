/// Reserved shadow topics for one thing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowTopics {
    pub update: String,
    pub update_delta: String,
    pub update_accepted: String,
    pub update_rejected: String,
    pub get: String,
    pub get_accepted: String,
    pub get_rejected: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowTopic {
    UpdateDelta,
    UpdateAccepted,
    UpdateRejected,
    GetAccepted,
    GetRejected,
}

impl ShadowTopics {
    pub fn new(thing_name: &str) -> Self {
        let base = format!("$aws/things/{thing_name}/shadow");
        Self {
            update: format!("{base}/update"),
            update_delta: format!("{base}/update/delta"),
            update_accepted: format!("{base}/update/accepted"),
            update_rejected: format!("{base}/update/rejected"),
            get: format!("{base}/get"),
            get_accepted: format!("{base}/get/accepted"),
            get_rejected: format!("{base}/get/rejected"),
        }
    }

    pub fn subscriptions(&self) -> [&str; 5] {
        [
            self.update_delta.as_str(),
            self.update_accepted.as_str(),
            self.update_rejected.as_str(),
            self.get_accepted.as_str(),
            self.get_rejected.as_str(),
        ]
    }

    pub fn classify(&self, topic: &str) -> Option<ShadowTopic> {
        if topic == self.update_delta {
            Some(ShadowTopic::UpdateDelta)
        } else if topic == self.update_accepted {
            Some(ShadowTopic::UpdateAccepted)
        } else if topic == self.update_rejected {
            Some(ShadowTopic::UpdateRejected)
        } else if topic == self.get_accepted {
            Some(ShadowTopic::GetAccepted)
        } else if topic == self.get_rejected {
            Some(ShadowTopic::GetRejected)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_classifies_topics() {
        let topics = ShadowTopics::new("iota");

        assert_eq!(topics.update, "$aws/things/iota/shadow/update");
        assert_eq!(
            topics.classify("$aws/things/iota/shadow/update/delta"),
            Some(ShadowTopic::UpdateDelta)
        );
        assert_eq!(
            topics.classify("$aws/things/iota/shadow/get/rejected"),
            Some(ShadowTopic::GetRejected)
        );
        assert_eq!(topics.classify("$aws/things/other/shadow/update/delta"), None);
    }
}
