//! User message template for the analysis call

/// Template name for the user message
pub const ANALYSIS_USER: &str = "analysis.user";

/// Per-run data, every field pre-rendered or `N/A`
pub const ANALYSIS_USER_TEMPLATE: &str = r"Analyze {{ company }} ({{ ticker }}):
Price: {{ price }}{% if currency %} {{ currency }}{% endif %}
PE: {{ pe }}, ROE: {{ roe }}, Margin: {{ margin }}
Debt/Equity: {{ debt }}
Sector: {{ sector }}
Market cap: {{ market_cap }}
Profile: {{ description }}
Recent news:{% for item in news %}
- {{ item }}{% else %} No recent news{% endfor %}
{%- if sustainability %}
Sustainability: {{ sustainability }}{% endif %}

Provide JSON analysis:";
