//! System instruction and per-page prompt.

use probdex_core::taxonomy::UNCATEGORIZED;
use probdex_core::Taxonomy;

/// Text part sent with every page image.
pub const PAGE_PROMPT: &str =
    "이 페이지의 모든 문제를 [규칙]에 따라 추출하고 분석하여 지정된 JSON 형식으로만 응답하십시오.";

/// Build the system instruction from the taxonomy.
pub fn build_instruction(taxonomy: &Taxonomy) -> String {
    let subjects = taxonomy
        .subject_names()
        .map(|s| format!("\"{}\"", s))
        .collect::<Vec<_>>()
        .join(", ");

    let units = taxonomy
        .subjects()
        .iter()
        .map(|entry| {
            let names = entry
                .units
                .iter()
                .map(|u| format!("\"{}\"", u))
                .collect::<Vec<_>>()
                .join(", ");
            format!("    - {}: [{}]", entry.name, names)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"당신은 대한민국 수능/평가원 수학 기출문제 분석가입니다.
입력된 페이지 이미지에 있는 모든 수학 문제를 인식하여, 문제마다 과목, 단원, 문항 번호, 문제 본문, 교육적 분석을 추출하십시오.

[규칙 1: 과목]
subject_name은 반드시 다음 중 하나여야 합니다: [{subjects}]

[규칙 2: 단원]
unit_name은 반드시 해당 과목의 다음 단원 중 하나여야 합니다:
{units}
문제가 아니거나(표지, 해설 등) 분류할 수 없으면 과목과 단원 모두 "{uncategorized}"로 지정하십시오.
여러 단원의 개념이 섞여 있으면 정답 도출에 직접 기여하는 주요 개념의 단원을 선택하십시오.

[규칙 3: 문항 번호]
number에는 페이지에 표시된 문항 번호를 정수로만 넣으십시오. 찾을 수 없으면 0으로 설정하십시오.

[규칙 4: 문제 본문]
problem_text에는 지문, <보기>, 배점을 포함하고 객관식 선지, 머리글, 페이지 번호는 제외하십시오.
수식은 LaTeX 문법으로 표기하십시오.

[규칙 5: 분석]
ai_analysis에는 다음 다섯 항목을 채우십시오.
    - core_concepts: 핵심 개념 목록
    - logic_flow: 정답에 이르는 이상적인 사고 과정
    - pattern_type: 문항 유형 목록
    - pitfalls: 자주 하는 실수 목록
    - difficulty_level: 1(매우 쉬움)부터 5(매우 어려움)까지의 정수. 판단할 수 없으면 0
판단할 수 없는 문자열은 "", 목록은 []로 채우십시오.

[규칙 6: 시스템 필드]
year, month, problem_id는 시스템이 파일명에서 계산합니다. 응답에 절대 포함하지 마십시오.

[응답 형식]
설명 없이 다음 구조의 JSON만 출력하십시오. 정의되지 않은 키를 추가하거나 키 이름과 타입을 바꾸지 마십시오.
{{
    "problems": [
        {{
            "subject_name": "미적분",
            "unit_name": "미분법",
            "number": 24,
            "problem_text": "함수 f(x)=x^3-3x+1의 극값을 구하시오. [3점]",
            "ai_analysis": {{
                "core_concepts": ["다항함수의 미분", "극값의 정의"],
                "logic_flow": "1. 도함수 계산 -> 2. f'(x)=0의 해 -> 3. 부호 변화로 극값 판정",
                "pattern_type": ["단순 계산형"],
                "pitfalls": ["부호 판정 누락"],
                "difficulty_level": 1
            }}
        }}
    ]
}}"#,
        subjects = subjects,
        units = units,
        uncategorized = UNCATEGORIZED,
    )
}
