//! Summary prompt template

use crate::error::Result;
use crate::types::NewsItem;
use minijinja::{Environment, context};

const SUMMARY_TEMPLATE_NAME: &str = "summary.txt";

/// System instruction sent with every summary request
pub const SUMMARY_SYSTEM: &str = "당신은 한국 주식 뉴스를 짧고 중립적으로 요약하는 애널리스트입니다.";

const SUMMARY_TEMPLATE: &str = "\
아래는 '{{ name }}' 종목에 관한 최근 뉴스 헤드라인입니다.
헤드라인만 근거로, 다음 형식의 세 줄로만 한국어로 답하세요.
📢 긍정: (호재 요약 한 줄)
⚠️ 부정: (악재 요약 한 줄)
📊 투자 의견: 매수 00%, 매도 00%, 보류 00%

헤드라인:
{% for item in headlines -%}
- {{ item.title }}
{% endfor %}";

/// Renders the three-line summary prompt
pub struct SummaryPrompt {
    env: Environment<'static>,
}

impl SummaryPrompt {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(SUMMARY_TEMPLATE_NAME, SUMMARY_TEMPLATE)?;
        Ok(Self { env })
    }

    /// Prompt for `name` over `headlines`
    pub fn render(&self, name: &str, headlines: &[NewsItem]) -> Result<String> {
        let template = self.env.get_template(SUMMARY_TEMPLATE_NAME)?;
        Ok(template.render(context! { name, headlines })?)
    }
}
